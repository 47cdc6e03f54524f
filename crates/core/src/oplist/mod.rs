//! Operator list construction, queue optimization and chunked streaming.
//!
//! - `list`: the instruction buffer and its snapshots
//! - `optimizer`: incremental pattern recognition over the queue tail
//! - `patterns`: the pattern table and its rewrites
//! - `atlas`: inline image packing for the inline image group rewrite
//! - `params`: chunking and pattern thresholds
//! - `sink`: chunk consumers

mod atlas;
pub mod list;
pub mod optimizer;
pub mod params;
mod patterns;
pub mod sink;

pub use list::{
    OpQueue, OperatorList, OperatorListChunk, OperatorListIR, OperatorListOptions, RenderIntent,
};
pub use optimizer::{NullOptimizer, Optimizer, QueueOptimizer};
pub use params::{ChunkParams, PatternLimits};
pub use sink::{
    ChannelSink, ChunkReceiver, OperatorListAssembler, SinkMessage, StreamSink, TransferList,
    channel,
};
