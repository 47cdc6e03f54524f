//! Incremental queue optimizer.
//!
//! The optimizer sees the queue after every append and advances only as far
//! as the new operation allows. Match progress lives in two small pieces of
//! state: the prefix of pattern start sequences matched so far, and the run
//! currently being extended. A flush resolves the open run as if input had
//! ended there, so no match state crosses a chunk boundary.

use super::list::OpQueue;
use super::params::PatternLimits;
use super::patterns::{PATTERN_COUNT, PATTERNS, starts_pattern};
use crate::model::{Args, OpCode};

/// Receives every appended operation of an operator list.
pub trait Optimizer {
    /// Appends one operation to `queue`, possibly rewriting its tail.
    fn push(&mut self, queue: &mut OpQueue, op: OpCode, args: Args);

    /// Resolves any pending partial match against the end of `queue`.
    fn flush(&mut self, queue: &mut OpQueue);

    /// Forgets all progress; called after the queue was emptied.
    fn reset(&mut self);
}

/// Appends without rewriting, for observers of the raw instruction stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOptimizer;

impl Optimizer for NullOptimizer {
    fn push(&mut self, queue: &mut OpQueue, op: OpCode, args: Args) {
        queue.push(op, args);
    }

    fn flush(&mut self, _queue: &mut OpQueue) {}

    fn reset(&mut self) {}
}

/// Progress through the start sequences of the pattern table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Prefix {
    /// Bit `n` set while `PATTERNS[n].start[..depth]` still matches.
    live: u32,
    depth: usize,
}

enum Step {
    Miss,
    Partial,
    Complete(usize),
}

impl Prefix {
    const ROOT: Self = Self {
        live: (1 << PATTERN_COUNT) - 1,
        depth: 0,
    };

    const fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Feeds one tag. On a miss the prefix is left unchanged.
    fn step(&mut self, op: OpCode) -> Step {
        let mut next = 0u32;
        for (idx, pattern) in PATTERNS.iter().enumerate() {
            if self.live & (1 << idx) == 0 || pattern.start.get(self.depth) != Some(&op) {
                continue;
            }
            if pattern.start.len() == self.depth + 1 {
                *self = Self::ROOT;
                return Step::Complete(idx);
            }
            next |= 1 << idx;
        }
        if next == 0 {
            return Step::Miss;
        }
        self.live = next;
        self.depth += 1;
        Step::Partial
    }
}

/// A run whose start sequence matched and passed its guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveMatch {
    pattern: usize,
    /// Index of the first operation of the run.
    first: usize,
}

/// Rewrites recognised runs into batched operations as they are appended.
#[derive(Debug, Clone)]
pub struct QueueOptimizer {
    limits: PatternLimits,
    prefix: Prefix,
    active: Option<ActiveMatch>,
    last_processed: usize,
}

impl Default for QueueOptimizer {
    fn default() -> Self {
        Self::new(PatternLimits::default())
    }
}

impl QueueOptimizer {
    pub const fn new(limits: PatternLimits) -> Self {
        Self {
            limits,
            prefix: Prefix::ROOT,
            active: None,
            last_processed: 0,
        }
    }

    pub const fn limits(&self) -> &PatternLimits {
        &self.limits
    }

    /// True while a run is open or a start sequence is partially matched.
    pub const fn is_matching(&self) -> bool {
        self.active.is_some() || !self.prefix.is_root()
    }

    fn process(&self, queue: &mut OpQueue, active: ActiveMatch, end: usize) -> usize {
        let pattern = &PATTERNS[active.pattern];
        (pattern.process)(queue, active.first, end, &self.limits)
    }

    fn optimize(&mut self, queue: &mut OpQueue) {
        let mut i = self.last_processed;
        let mut ii = queue.len();

        if self.active.is_none()
            && self.prefix.is_root()
            && i + 1 == ii
            && !starts_pattern(queue.ops[i])
        {
            self.last_processed = ii;
            return;
        }

        while i < ii {
            if let Some(active) = self.active {
                let pattern = &PATTERNS[active.pattern];
                if (pattern.iterate)(queue, active.first, i) {
                    i += 1;
                    continue;
                }
                i = self.process(queue, active, i);
                ii = queue.len();
                self.active = None;
                self.prefix = Prefix::ROOT;
                if i >= ii {
                    break;
                }
            }

            match self.prefix.step(queue.ops[i]) {
                Step::Partial => i += 1,
                // Retry the same tag as the start of a fresh prefix.
                Step::Miss if !self.prefix.is_root() => self.prefix = Prefix::ROOT,
                Step::Miss => i += 1,
                Step::Complete(idx) => {
                    let pattern = &PATTERNS[idx];
                    let first = i + 1 - pattern.start.len();
                    i += 1;
                    if pattern.check.is_none_or(|check| check(queue, first)) {
                        self.active = Some(ActiveMatch {
                            pattern: idx,
                            first,
                        });
                    }
                }
            }
        }

        self.last_processed = i;
    }
}

impl Optimizer for QueueOptimizer {
    fn push(&mut self, queue: &mut OpQueue, op: OpCode, args: Args) {
        queue.push(op, args);
        self.optimize(queue);
    }

    fn flush(&mut self, queue: &mut OpQueue) {
        while let Some(active) = self.active.take() {
            let end = queue.len();
            self.last_processed = self.process(queue, active, end);
            self.prefix = Prefix::ROOT;
            self.optimize(queue);
        }
    }

    fn reset(&mut self) {
        self.prefix = Prefix::ROOT;
        self.active = None;
        self.last_processed = 0;
    }
}
