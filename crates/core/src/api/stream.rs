//! Multi-page operator list production on a worker pool.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, sync_channel};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::document::Page;
use crate::error::{RenderError, Result};
use crate::oplist::{OperatorListAssembler, OperatorListIR};
use crate::worker::TaskRegistry;

use super::page::{RenderOptions, render_page};

pub const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 16;

type StreamItem = (usize, Result<OperatorListIR>);

pub(crate) fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Finished pages in request order.
///
/// Pages render concurrently and are buffered until every earlier page has
/// been yielded. The first error ends the stream. Dropping the stream
/// terminates every page still rendering.
pub struct OperatorListStream {
    rx: Receiver<StreamItem>,
    order: Vec<usize>,
    next_pos: usize,
    buffer: BTreeMap<usize, Result<OperatorListIR>>,
    done: bool,
    failed: bool,
    max_buffered: usize,
    cancel: Arc<AtomicBool>,
    registry: TaskRegistry,
}

impl OperatorListStream {
    fn new(
        rx: Receiver<StreamItem>,
        order: Vec<usize>,
        cancel: Arc<AtomicBool>,
        registry: TaskRegistry,
    ) -> Self {
        Self {
            rx,
            order,
            next_pos: 0,
            buffer: BTreeMap::new(),
            done: false,
            failed: false,
            max_buffered: 0,
            cancel,
            registry,
        }
    }

    /// Most pages held back at once waiting for an earlier page.
    pub const fn max_buffered(&self) -> usize {
        self.max_buffered
    }

    /// The registry the page tasks run under.
    pub const fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.registry.cancel_all();
    }

    /// Moves one finished page from the workers into the reorder buffer.
    ///
    /// Returns false once every worker has hung up.
    fn receive(&mut self) -> bool {
        if self.done {
            return false;
        }
        match self.rx.recv() {
            Ok((page_index, result)) => {
                self.buffer.insert(page_index, result);
                self.max_buffered = self.max_buffered.max(self.buffer.len());
                true
            }
            Err(_) => {
                self.done = true;
                false
            }
        }
    }
}

impl Iterator for OperatorListStream {
    type Item = Result<(usize, OperatorListIR)>;

    /// Yields the next page in request order, waiting for it if later pages
    /// finished first.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let page_index = *self.order.get(self.next_pos)?;

        let result = loop {
            if let Some(result) = self.buffer.remove(&page_index) {
                break result;
            }
            if !self.receive() {
                return None;
            }
        };
        self.next_pos += 1;

        // Pages after a failed one are abandoned.
        if result.is_err() {
            self.failed = true;
            self.stop();
        }
        Some(result.map(|ir| (page_index, ir)))
    }
}

impl Drop for OperatorListStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Renders `pages` concurrently, yielding each page's operator list in the
/// order given.
pub fn render_pages_stream(pages: Vec<Page>, options: RenderOptions) -> Result<OperatorListStream> {
    options.limits.validate()?;

    let order: Vec<usize> = pages.iter().map(|page| page.index).collect();
    let work: Arc<Vec<Mutex<Option<Page>>>> =
        Arc::new(pages.into_iter().map(|p| Mutex::new(Some(p))).collect());

    let thread_count = match options.threads {
        0 => default_thread_count(),
        n => n,
    }
    .min(order.len().max(1));
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|e| RenderError::Evaluator(e.to_string()))?;

    let (tx, rx) = sync_channel(DEFAULT_STREAM_BUFFER_CAPACITY);
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_worker = Arc::clone(&cancel);
    let registry = TaskRegistry::new();
    let registry_worker = registry.clone();
    let next_index = Arc::new(AtomicUsize::new(0));

    std::thread::spawn(move || {
        pool.install(|| {
            (0..thread_count).into_par_iter().for_each(|_| {
                loop {
                    if cancel_worker.load(Ordering::Relaxed) {
                        return;
                    }
                    let pos = next_index.fetch_add(1, Ordering::Relaxed);
                    let Some(slot) = work.get(pos) else {
                        break;
                    };
                    let Some(mut page) = slot.lock().unwrap_or_else(PoisonError::into_inner).take()
                    else {
                        continue;
                    };

                    let assembler = OperatorListAssembler::new();
                    let result = render_page(&registry_worker, &mut page, assembler.clone(), &options)
                        .map(|_| assembler.take());
                    if cancel_worker.load(Ordering::Relaxed) {
                        return;
                    }
                    if tx.send((page.index, result)).is_err() {
                        cancel_worker.store(true, Ordering::Relaxed);
                        return;
                    }
                }
            });
        });
    });

    Ok(OperatorListStream::new(rx, order, cancel, registry))
}
