//! The operator list: an append-only instruction buffer with chunked delivery.

use std::fmt;
use std::mem;
use std::ops::Range;

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::trace;

use super::optimizer::{NullOptimizer, Optimizer, QueueOptimizer};
use super::params::{ChunkParams, PatternLimits};
use super::sink::{StreamSink, TransferList};
use crate::error::{RenderError, Result};
use crate::model::{Arg, Args, OpCode};

/// What the operator list is being built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderIntent {
    /// On-screen rendering.
    #[default]
    Display,
    /// Print rendering; only printable annotations are included.
    Print,
    /// Raw operator list for inspection; never optimized.
    OpList,
}

impl RenderIntent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Print => "print",
            Self::OpList => "oplist",
        }
    }
}

/// Construction options for a streaming operator list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorListOptions {
    pub intent: RenderIntent,
    pub page_index: Option<usize>,
    pub chunking: ChunkParams,
    pub limits: PatternLimits,
}

/// The two index-aligned columns of an operator list.
///
/// `ops.len() == args.len()` holds at every point observable from outside
/// this crate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpQueue {
    pub(crate) ops: Vec<OpCode>,
    pub(crate) args: Vec<Args>,
}

impl OpQueue {
    pub const fn len(&self) -> usize {
        self.ops.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[OpCode] {
        &self.ops
    }

    pub fn args(&self) -> &[Args] {
        &self.args
    }

    pub fn push(&mut self, op: OpCode, args: Args) {
        self.ops.push(op);
        self.args.push(args);
    }

    /// Replaces `range` with a single operation.
    pub(crate) fn splice_one(&mut self, range: Range<usize>, op: OpCode, args: Args) {
        self.ops.splice(range.clone(), [op]);
        self.args.splice(range, [args]);
    }

    /// Keeps only the entries of `range` whose offset within it satisfies `keep`.
    pub(crate) fn retain_in(&mut self, range: Range<usize>, keep: impl Fn(usize) -> bool) {
        let start = range.start;
        let mask: Vec<bool> = (0..range.len()).map(keep).collect();
        let ops: Vec<OpCode> = self
            .ops
            .drain(range.clone())
            .zip(&mask)
            .filter_map(|(op, &k)| k.then_some(op))
            .collect();
        let args: Vec<Args> = self
            .args
            .drain(range)
            .zip(&mask)
            .filter_map(|(a, &k)| k.then_some(a))
            .collect();
        self.ops.splice(start..start, ops);
        self.args.splice(start..start, args);
    }

    fn take(&mut self) -> (Vec<OpCode>, Vec<Args>) {
        (mem::take(&mut self.ops), mem::take(&mut self.args))
    }
}

/// A snapshot of an operator list's pending operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorListIR {
    pub ops: Vec<OpCode>,
    pub args: Vec<Args>,
    pub length: usize,
}

/// One flushed slice of the instruction stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorListChunk {
    pub ops: Vec<OpCode>,
    pub args: Vec<Args>,
    /// No further chunk follows this one.
    pub last_chunk: bool,
    pub length: usize,
}

/// Instruction buffer for one page or appearance stream.
///
/// The producer appends with [`add_op`](Self::add_op). With a sink attached,
/// the list flushes itself in chunks and the producer calls
/// [`flush(true)`](Self::flush) once at the end. Without a sink the list is
/// read once through [`get_ir`](Self::get_ir) or [`into_ir`](Self::into_ir).
pub struct OperatorList {
    queue: OpQueue,
    optimizer: Box<dyn Optimizer + Send>,
    sink: Option<Box<dyn StreamSink + Send>>,
    dependencies: FxHashSet<SmolStr>,
    flushed_length: usize,
    weight: usize,
    intent: RenderIntent,
    page_index: Option<usize>,
    chunking: ChunkParams,
}

impl Default for OperatorList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperatorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorList")
            .field("intent", &self.intent)
            .field("page_index", &self.page_index)
            .field("length", &self.len())
            .field("total_length", &self.total_length())
            .field("weight", &self.weight)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl OperatorList {
    /// Creates a sink-less list, read once with [`get_ir`](Self::get_ir).
    pub fn new() -> Self {
        Self::build(OperatorListOptions::default(), None)
    }

    /// Creates a list that streams chunks into `sink`.
    pub fn with_sink(sink: impl StreamSink + Send + 'static, options: OperatorListOptions) -> Self {
        let sink: Box<dyn StreamSink + Send> = Box::new(sink);
        Self::build(options, Some(sink))
    }

    /// Creates a list from options and an optional boxed sink.
    ///
    /// Only a list with a sink and a rendering intent is optimized.
    pub fn build(options: OperatorListOptions, sink: Option<Box<dyn StreamSink + Send>>) -> Self {
        let optimizer: Box<dyn Optimizer + Send> =
            if sink.is_some() && options.intent != RenderIntent::OpList {
                Box::new(QueueOptimizer::new(options.limits))
            } else {
                Box::new(NullOptimizer)
            };
        Self {
            queue: OpQueue::default(),
            optimizer,
            sink,
            dependencies: FxHashSet::default(),
            flushed_length: 0,
            weight: 0,
            intent: options.intent,
            page_index: options.page_index,
            chunking: options.chunking,
        }
    }

    /// Operations pending since the last flush.
    pub const fn len(&self) -> usize {
        self.queue.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Operations flushed so far plus those still pending.
    pub const fn total_length(&self) -> usize {
        self.flushed_length + self.queue.len()
    }

    /// Appends since the last flush; drives implicit flushing.
    pub const fn weight(&self) -> usize {
        self.weight
    }

    pub const fn intent(&self) -> RenderIntent {
        self.intent
    }

    pub const fn page_index(&self) -> Option<usize> {
        self.page_index
    }

    pub fn ops(&self) -> &[OpCode] {
        self.queue.ops()
    }

    pub fn args(&self) -> &[Args] {
        self.queue.args()
    }

    pub const fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Dependency ids emitted since the last flush.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(SmolStr::as_str)
    }

    /// Whether the consumer wants more chunks. Always true without a sink.
    pub fn ready(&self) -> bool {
        self.sink.as_ref().is_none_or(|sink| sink.ready())
    }

    /// Appends one operation.
    pub fn add_op(&mut self, op: OpCode, args: Args) {
        self.optimizer.push(&mut self.queue, op, args);
        self.weight += 1;

        if self.sink.is_some() {
            let at_boundary = op == OpCode::RESTORE || op == OpCode::END_TEXT;
            if self.weight >= self.chunking.chunk_size
                || (self.weight >= self.chunking.near_mark() && at_boundary)
            {
                self.flush_to_sink(false);
            }
        }
    }

    /// Records a resource the following operations depend on.
    ///
    /// Emits one `dependency` operation per id per chunk.
    pub fn add_dependency(&mut self, id: impl AsRef<str>) {
        let id = SmolStr::new(id);
        if self.dependencies.contains(&id) {
            return;
        }
        self.dependencies.insert(id.clone());
        self.add_op(OpCode::DEPENDENCY, vec![Arg::Name(id)]);
    }

    pub fn add_dependencies<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            self.add_dependency(id);
        }
    }

    /// Appends every operation of `other`, as if each had been added here.
    ///
    /// Dependency operations for ids already recorded in this list are
    /// dropped.
    pub fn add_op_list(&mut self, mut other: Self) {
        let (ops, args) = other.queue.take();
        for (op, args) in ops.into_iter().zip(args) {
            if op == OpCode::DEPENDENCY {
                if let Some(id) = args.first().and_then(Arg::as_name) {
                    if !self.dependencies.insert(SmolStr::new(id)) {
                        continue;
                    }
                }
            }
            self.add_op(op, args);
        }
    }

    /// Copies the pending operations without flushing.
    pub fn get_ir(&self) -> OperatorListIR {
        OperatorListIR {
            ops: self.queue.ops.clone(),
            args: self.queue.args.clone(),
            length: self.queue.len(),
        }
    }

    /// Consumes the list, returning its pending operations.
    pub fn into_ir(mut self) -> OperatorListIR {
        let (ops, args) = self.queue.take();
        let length = ops.len();
        OperatorListIR { ops, args, length }
    }

    /// Sample buffers of pending image operations that move to the consumer.
    ///
    /// Images held by a resource cache are shared and never listed.
    pub fn transfers(&self) -> TransferList {
        collect_transfers(&self.queue)
    }

    /// Delivers all pending operations to the sink as one chunk.
    pub fn flush(&mut self, last_chunk: bool) -> Result<()> {
        if self.sink.is_none() {
            return Err(RenderError::MissingSink);
        }
        self.flush_to_sink(last_chunk);
        Ok(())
    }

    fn flush_to_sink(&mut self, last_chunk: bool) {
        self.optimizer.flush(&mut self.queue);
        let transfers = collect_transfers(&self.queue);
        let (ops, args) = self.queue.take();
        let length = ops.len();
        self.flushed_length += length;

        trace!(
            page_index = ?self.page_index,
            intent = self.intent.as_str(),
            length,
            last_chunk,
            transfers = transfers.len(),
            "operator list chunk flushed"
        );

        if let Some(sink) = self.sink.as_mut() {
            sink.enqueue(
                OperatorListChunk {
                    ops,
                    args,
                    last_chunk,
                    length,
                },
                1,
                transfers,
            );
        }

        self.dependencies.clear();
        self.weight = 0;
        self.optimizer.reset();
    }
}

fn collect_transfers(queue: &OpQueue) -> TransferList {
    let mut transfers = TransferList::new();
    for (op, args) in queue.ops.iter().zip(&queue.args) {
        match *op {
            OpCode::PAINT_INLINE_IMAGE
            | OpCode::PAINT_INLINE_IMAGE_GROUP
            | OpCode::PAINT_IMAGE_MASK => {
                if let Some(image) = args.first().and_then(Arg::as_image) {
                    if !image.cached {
                        transfers.push(image.data.clone());
                    }
                }
            }
            _ => {}
        }
    }
    transfers
}
