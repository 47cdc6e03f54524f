//! Chunk sinks: where a streaming operator list delivers its chunks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tracing::debug;

use super::list::{OperatorListChunk, OperatorListIR};

/// Sample buffers whose ownership moves to the consumer with a chunk.
pub type TransferList = Vec<Bytes>;

/// Consumer side of a streaming operator list.
pub trait StreamSink {
    /// Accepts one chunk. `size` is the chunk's weight for backpressure.
    fn enqueue(&mut self, chunk: OperatorListChunk, size: usize, transfers: TransferList);

    /// Whether the consumer wants more chunks. Advisory only.
    fn ready(&self) -> bool {
        true
    }
}

/// One delivered chunk together with its transfer list.
#[derive(Debug, Clone)]
pub struct SinkMessage {
    pub chunk: OperatorListChunk,
    pub size: usize,
    pub transfers: TransferList,
}

/// Creates a connected sink and receiver.
///
/// The sink reports not-ready once `capacity` chunks are in flight. It never
/// blocks the producer.
pub fn channel(capacity: usize) -> (ChannelSink, ChunkReceiver) {
    let (tx, rx) = std::sync::mpsc::channel();
    let in_flight = Arc::new(AtomicUsize::new(0));
    (
        ChannelSink {
            tx,
            in_flight: Arc::clone(&in_flight),
            capacity: capacity.max(1),
            cancelled: false,
        },
        ChunkReceiver { rx, in_flight },
    )
}

/// Sending half of [`channel`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<SinkMessage>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
    cancelled: bool,
}

impl ChannelSink {
    /// True once the receiver has been dropped.
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl StreamSink for ChannelSink {
    fn enqueue(&mut self, chunk: OperatorListChunk, size: usize, transfers: TransferList) {
        if self.cancelled {
            return;
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let message = SinkMessage {
            chunk,
            size,
            transfers,
        };
        if self.tx.send(message).is_err() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            self.cancelled = true;
            debug!("chunk receiver dropped, discarding further chunks");
        }
    }

    fn ready(&self) -> bool {
        !self.cancelled && self.in_flight.load(Ordering::Acquire) < self.capacity
    }
}

/// Receiving half of [`channel`]; iterates chunks in delivery order.
#[derive(Debug)]
pub struct ChunkReceiver {
    rx: Receiver<SinkMessage>,
    in_flight: Arc<AtomicUsize>,
}

impl ChunkReceiver {
    /// Chunks delivered but not yet received.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Receives without blocking.
    pub fn try_next(&self) -> Option<SinkMessage> {
        let message = self.rx.try_recv().ok()?;
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Concatenates chunks until the last one arrives.
    ///
    /// Returns `None` if the producer went away before sending its last chunk.
    pub fn collect_ir(self) -> Option<OperatorListIR> {
        let mut ir = OperatorListIR::default();
        for message in self {
            let last = message.chunk.last_chunk;
            append_chunk(&mut ir, message.chunk);
            if last {
                return Some(ir);
            }
        }
        None
    }
}

impl Iterator for ChunkReceiver {
    type Item = SinkMessage;

    fn next(&mut self) -> Option<Self::Item> {
        let message = self.rx.recv().ok()?;
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }
}

fn append_chunk(ir: &mut OperatorListIR, chunk: OperatorListChunk) {
    ir.ops.extend(chunk.ops);
    ir.args.extend(chunk.args);
    ir.length += chunk.length;
}

#[derive(Debug, Default)]
struct AssemblerState {
    ir: OperatorListIR,
    chunks: usize,
    transfers: usize,
    complete: bool,
}

/// Sink that reassembles chunks into one operator list.
///
/// Clones share state, so one clone can be handed to the producer while the
/// other is inspected.
#[derive(Debug, Clone, Default)]
pub struct OperatorListAssembler {
    state: Arc<Mutex<AssemblerState>>,
}

impl OperatorListAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut AssemblerState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// True once the last chunk arrived.
    pub fn is_complete(&self) -> bool {
        self.with_state(|s| s.complete)
    }

    pub fn chunk_count(&self) -> usize {
        self.with_state(|s| s.chunks)
    }

    /// Total buffers transferred so far.
    pub fn transfer_count(&self) -> usize {
        self.with_state(|s| s.transfers)
    }

    /// Copy of everything received so far.
    pub fn snapshot(&self) -> OperatorListIR {
        self.with_state(|s| s.ir.clone())
    }

    /// Takes the assembled list, leaving the assembler empty.
    pub fn take(&self) -> OperatorListIR {
        self.with_state(|s| std::mem::take(&mut s.ir))
    }
}

impl StreamSink for OperatorListAssembler {
    fn enqueue(&mut self, chunk: OperatorListChunk, _size: usize, transfers: TransferList) {
        self.with_state(|s| {
            s.complete = chunk.last_chunk;
            s.chunks += 1;
            s.transfers += transfers.len();
            append_chunk(&mut s.ir, chunk);
        });
    }
}
