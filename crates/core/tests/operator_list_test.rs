//! Tests for the operator list buffer: chunking, dependencies, transfers and
//! snapshots.

mod common;

use std::sync::Arc;

use common::{display_options, rgba, translate};
use quire_core::oplist::{OperatorListAssembler, SinkMessage};
use quire_core::{
    Arg, ChunkParams, ImageData, ImageKind, OpCode, OperatorList, OperatorListOptions,
    RenderError, RenderIntent, channel,
};

const FILL: OpCode = OpCode(22);

fn collect(rx: quire_core::oplist::ChunkReceiver) -> Vec<SinkMessage> {
    rx.collect()
}

// ============================================================================
// Chunking
// ============================================================================

#[test]
fn test_chunks_at_high_water_mark() {
    let (sink, rx) = channel(16);
    let mut list = OperatorList::with_sink(sink, display_options());
    for n in 0..2500 {
        list.add_op(FILL, vec![Arg::Int(n)]);
        assert_eq!(list.ops().len(), list.args().len());
    }
    assert_eq!(list.len(), 500);
    assert_eq!(list.weight(), 500);
    list.flush(true).unwrap();
    drop(list);

    let chunks = collect(rx);
    let lengths: Vec<usize> = chunks.iter().map(|m| m.chunk.length).collect();
    assert_eq!(lengths, vec![1000, 1000, 500]);
    for (i, message) in chunks.iter().enumerate() {
        assert_eq!(message.chunk.ops.len(), message.chunk.args.len());
        assert_eq!(message.chunk.last_chunk, i == 2);
    }
    assert_eq!(chunks[1].chunk.args[0], vec![Arg::Int(1000)]);
}

#[test]
fn test_near_mark_flushes_on_scope_close() {
    let (sink, rx) = channel(16);
    let mut list = OperatorList::with_sink(sink, display_options());
    for _ in 0..994 {
        list.add_op(FILL, Vec::new());
    }
    list.add_op(OpCode::RESTORE, Vec::new());
    assert_eq!(list.len(), 0);
    assert_eq!(list.weight(), 0);
    assert_eq!(list.total_length(), 995);

    for _ in 0..994 {
        list.add_op(FILL, Vec::new());
    }
    list.add_op(OpCode::END_TEXT, Vec::new());
    assert_eq!(list.total_length(), 1990);
    assert!(list.is_empty());
    drop(list);

    let lengths: Vec<usize> = collect(rx).iter().map(|m| m.chunk.length).collect();
    assert_eq!(lengths, vec![995, 995]);
}

#[test]
fn test_near_mark_ignores_other_ops() {
    let (sink, _rx) = channel(16);
    let mut list = OperatorList::with_sink(sink, display_options());
    for _ in 0..996 {
        list.add_op(FILL, Vec::new());
    }
    assert_eq!(list.len(), 996);
    list.add_op(OpCode::RESTORE, Vec::new());
    assert_eq!(list.len(), 0);
}

#[test]
fn test_custom_chunk_size() {
    let options = OperatorListOptions {
        chunking: ChunkParams {
            chunk_size: 10,
            boundary_margin: 2,
        },
        ..display_options()
    };
    let (sink, rx) = channel(16);
    let mut list = OperatorList::with_sink(sink, options);
    for _ in 0..7 {
        list.add_op(FILL, Vec::new());
    }
    list.add_op(OpCode::RESTORE, Vec::new());
    for _ in 0..10 {
        list.add_op(FILL, Vec::new());
    }
    list.flush(true).unwrap();
    drop(list);

    let lengths: Vec<usize> = collect(rx).iter().map(|m| m.chunk.length).collect();
    assert_eq!(lengths, vec![8, 10, 0]);
}

#[test]
fn test_flush_on_empty_delivers_empty_chunk() {
    let (sink, rx) = channel(16);
    let mut list = OperatorList::with_sink(sink, display_options());
    list.add_op(FILL, Vec::new());
    list.flush(false).unwrap();
    list.flush(false).unwrap();
    assert_eq!(list.total_length(), 1);
    list.flush(true).unwrap();
    assert_eq!(list.total_length(), 1);
    drop(list);

    let chunks = collect(rx);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[1].chunk.length, 0);
    assert!(!chunks[1].chunk.last_chunk);
    assert!(chunks[2].chunk.last_chunk);
}

#[test]
fn test_flush_without_sink_is_an_error() {
    let mut list = OperatorList::new();
    list.add_op(FILL, Vec::new());
    assert!(matches!(list.flush(true), Err(RenderError::MissingSink)));
    assert_eq!(list.len(), 1);
}

#[test]
fn test_sinkless_list_never_chunks() {
    let mut list = OperatorList::new();
    for _ in 0..1500 {
        list.add_op(OpCode::RESTORE, Vec::new());
    }
    assert_eq!(list.len(), 1500);
    assert_eq!(list.weight(), 1500);
    assert!(list.ready());
}

#[test]
fn test_ready_follows_sink_backpressure() {
    let (sink, rx) = channel(1);
    let mut list = OperatorList::with_sink(sink, display_options());
    assert!(list.ready());
    list.flush(false).unwrap();
    assert!(!list.ready());
    assert!(rx.try_next().is_some());
    assert!(list.ready());
}

// ============================================================================
// Dependencies
// ============================================================================

#[test]
fn test_dependency_emitted_once_per_chunk() {
    let (sink, rx) = channel(16);
    let mut list = OperatorList::with_sink(sink, display_options());
    list.add_dependency("F1");
    list.add_dependency("F1");
    list.add_dependencies(["F1", "Im2"]);
    let mut deps: Vec<&str> = list.dependencies().collect();
    deps.sort_unstable();
    assert_eq!(deps, vec!["F1", "Im2"]);

    list.flush(false).unwrap();
    assert_eq!(list.dependencies().count(), 0);
    list.add_dependency("F1");
    list.flush(true).unwrap();
    drop(list);

    let chunks = collect(rx);
    assert_eq!(chunks[0].chunk.ops, vec![OpCode::DEPENDENCY; 2]);
    assert_eq!(chunks[0].chunk.args[0], vec![Arg::name("F1")]);
    assert_eq!(chunks[0].chunk.args[1], vec![Arg::name("Im2")]);
    assert_eq!(chunks[1].chunk.ops, vec![OpCode::DEPENDENCY]);
}

#[test]
fn test_add_op_list_skips_known_dependencies() {
    let mut page = OperatorList::new();
    page.add_dependency("F1");
    page.add_op(FILL, Vec::new());

    let mut sub = OperatorList::new();
    sub.add_dependency("F1");
    sub.add_dependency("F2");
    sub.add_op(OpCode::SHOW_TEXT, vec![Arg::Int(7)]);

    page.add_op_list(sub);
    let ir = page.into_ir();
    assert_eq!(
        ir.ops,
        vec![OpCode::DEPENDENCY, FILL, OpCode::DEPENDENCY, OpCode::SHOW_TEXT]
    );
    assert_eq!(ir.args[2], vec![Arg::name("F2")]);
    assert_eq!(ir.args[3], vec![Arg::Int(7)]);
    assert_eq!(ir.length, 4);
}

// ============================================================================
// Transfers and snapshots
// ============================================================================

#[test]
fn test_transfer_list_skips_cached_images() {
    let (sink, rx) = channel(16);
    let mut list = OperatorList::with_sink(sink, display_options());
    let fresh = rgba(1, 1);
    let cached = Arc::new(
        ImageData::new(2, 2, ImageKind::Grayscale1Bpp, vec![0u8, 0]).into_cached(),
    );
    list.add_op(OpCode::PAINT_INLINE_IMAGE, vec![Arg::Image(Arc::clone(&fresh))]);
    list.add_op(OpCode::PAINT_IMAGE_MASK, vec![Arg::Image(cached)]);
    list.add_op(OpCode::PAINT_IMAGE, vec![Arg::Image(rgba(1, 1))]);
    assert_eq!(list.transfers().len(), 1);
    list.flush(true).unwrap();
    drop(list);

    let chunks = collect(rx);
    assert_eq!(chunks[0].transfers.len(), 1);
    assert_eq!(chunks[0].transfers[0], fresh.data);
}

#[test]
fn test_get_ir_is_a_snapshot() {
    let mut list = OperatorList::new();
    list.add_op(OpCode::SAVE, Vec::new());
    list.add_op(OpCode::TRANSFORM, translate(1.0, 2.0));
    let ir = list.get_ir();
    list.add_op(OpCode::RESTORE, Vec::new());

    assert_eq!(ir.length, 2);
    assert_eq!(ir.ops, vec![OpCode::SAVE, OpCode::TRANSFORM]);
    assert_eq!(list.len(), 3);
    assert_eq!(list.total_length(), 3);
}

#[test]
fn test_sinkless_list_is_not_optimized() {
    let image = rgba(4, 4);
    let mut list = OperatorList::new();
    for q in 0..5 {
        for (op, args) in common::image_group(OpCode::PAINT_IMAGE, &image, translate(q as f64, 0.0))
        {
            list.add_op(op, args);
        }
    }
    assert_eq!(list.len(), 20);
}

#[test]
fn test_assembler_reassembles_in_order() {
    let assembler = OperatorListAssembler::new();
    let options = OperatorListOptions {
        intent: RenderIntent::Print,
        page_index: Some(3),
        chunking: ChunkParams {
            chunk_size: 4,
            boundary_margin: 0,
        },
        ..Default::default()
    };
    let mut list = OperatorList::with_sink(assembler.clone(), options);
    assert_eq!(list.page_index(), Some(3));
    assert_eq!(list.intent(), RenderIntent::Print);
    for n in 0..10 {
        list.add_op(FILL, vec![Arg::Int(n)]);
    }
    list.flush(true).unwrap();

    let ir = assembler.take();
    assert_eq!(assembler.chunk_count(), 3);
    assert_eq!(ir.length, 10);
    let values: Vec<i64> = ir
        .args
        .iter()
        .map(|args| match args[0] {
            Arg::Int(v) => v,
            _ => -1,
        })
        .collect();
    assert_eq!(values, (0..10).collect::<Vec<_>>());
}
