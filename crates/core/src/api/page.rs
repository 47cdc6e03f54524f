//! Page-level operator list production.

use std::time::Instant;

use tracing::{debug, info};

use crate::document::{Page, append_annotations};
use crate::error::Result;
use crate::oplist::{
    ChunkParams, OperatorList, OperatorListOptions, PatternLimits, RenderIntent, StreamSink,
};
use crate::worker::{TaskRegistry, WorkerTask};

/// Decoder of a content stream, appending operations to a list.
///
/// The evaluator owns the instruction grammar. Each call to
/// [`step`](Self::step) decodes some bounded amount of content, which makes
/// the gap between calls a suspension point where cancellation is observed.
pub trait ContentEvaluator {
    /// Appends the next operations. Returns `false` once the content is
    /// exhausted.
    fn step(&mut self, list: &mut OperatorList) -> Result<bool>;

    /// Rewinds to the start of the content.
    fn reset(&mut self) {}
}

/// Options for rendering pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub intent: RenderIntent,
    pub chunking: ChunkParams,
    pub limits: PatternLimits,
    /// Worker threads for multi-page rendering. 0 means one per core.
    pub threads: usize,
}

impl RenderOptions {
    pub const fn with_intent(mut self, intent: RenderIntent) -> Self {
        self.intent = intent;
        self
    }

    pub(crate) const fn list_options(&self, page_index: usize) -> OperatorListOptions {
        OperatorListOptions {
            intent: self.intent,
            page_index: Some(page_index),
            chunking: self.chunking,
            limits: self.limits,
        }
    }
}

/// Runs `evaluator` to completion into `list`.
///
/// The task is checked before every step. A terminated task stops
/// production with [`RenderError::Terminated`](crate::RenderError::Terminated)
/// and nothing further is appended or flushed.
pub fn get_operator_list<E>(
    evaluator: &mut E,
    list: &mut OperatorList,
    task: &WorkerTask,
) -> Result<()>
where
    E: ContentEvaluator + ?Sized,
{
    loop {
        task.ensure_not_terminated()?;
        if !evaluator.step(list)? {
            return Ok(());
        }
    }
}

/// Renders one page into `sink`, annotations included.
///
/// The page runs as a task named `RenderPageRequest: page N` (one-based),
/// registered with `registry` for its duration. Returns the total number of
/// operations delivered.
pub fn render_page(
    registry: &TaskRegistry,
    page: &mut Page,
    sink: impl StreamSink + Send + 'static,
    options: &RenderOptions,
) -> Result<usize> {
    let page_number = page.index + 1;
    let task = registry.start_new(format!("RenderPageRequest: page {page_number}"))?;
    let started = Instant::now();

    let result = produce_page(&task, page, sink, options);
    registry.finish(&task);

    match &result {
        Ok(length) => info!(
            page = page_number,
            intent = options.intent.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            len = *length,
            "page operator list complete"
        ),
        Err(e) if e.is_terminated() => {
            debug!(page = page_number, "page rendering stopped: {e}");
        }
        Err(_) => {}
    }
    result
}

fn produce_page(
    task: &WorkerTask,
    page: &mut Page,
    sink: impl StreamSink + Send + 'static,
    options: &RenderOptions,
) -> Result<usize> {
    options.limits.validate()?;
    let mut list = OperatorList::with_sink(sink, options.list_options(page.index));
    get_operator_list(page.content.as_mut(), &mut list, task)?;
    append_annotations(&mut page.annotations, &mut list, task, options.intent)?;
    task.ensure_not_terminated()?;
    list.flush(true)?;
    Ok(list.total_length())
}
