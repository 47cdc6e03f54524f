//! Shared fixtures for operator list tests.

#![allow(dead_code)]

use std::sync::Arc;

use quire_core::oplist::OperatorListAssembler;
use quire_core::{
    Arg, Args, ContentEvaluator, ImageData, ImageKind, OpCode, OperatorList, OperatorListIR,
    OperatorListOptions, RenderIntent, Result,
};

/// Evaluator replaying a fixed script, one batch of operations per step.
#[derive(Debug, Clone, Default)]
pub struct ScriptEvaluator {
    pub steps: Vec<Vec<(OpCode, Args)>>,
    pub dependencies: Vec<&'static str>,
    pos: usize,
}

impl ScriptEvaluator {
    pub fn new(steps: Vec<Vec<(OpCode, Args)>>) -> Self {
        Self {
            steps,
            dependencies: Vec::new(),
            pos: 0,
        }
    }

    /// One step per operation.
    pub fn flat(ops: Vec<(OpCode, Args)>) -> Self {
        Self::new(ops.into_iter().map(|op| vec![op]).collect())
    }

    pub fn with_dependency(mut self, id: &'static str) -> Self {
        self.dependencies.push(id);
        self
    }
}

impl ContentEvaluator for ScriptEvaluator {
    fn step(&mut self, list: &mut OperatorList) -> Result<bool> {
        if self.pos == 0 {
            list.add_dependencies(self.dependencies.iter().copied());
        }
        let Some(batch) = self.steps.get(self.pos) else {
            return Ok(false);
        };
        for (op, args) in batch.clone() {
            list.add_op(op, args);
        }
        self.pos += 1;
        Ok(true)
    }

    fn reset(&mut self) {
        self.pos = 0;
    }
}

pub fn translate(x: f64, y: f64) -> Args {
    scale_translate(1.0, 1.0, x, y)
}

pub fn scale_translate(sx: f64, sy: f64, x: f64, y: f64) -> Args {
    [sx, 0.0, 0.0, sy, x, y].into_iter().map(Arg::Number).collect()
}

pub fn rgba(width: u32, height: u32) -> Arc<ImageData> {
    let data = vec![200u8; (width * height * 4) as usize];
    Arc::new(ImageData::new(width, height, ImageKind::Rgba32Bpp, data))
}

/// A 2x2 mask with some bits set.
pub fn mask() -> Arc<ImageData> {
    Arc::new(ImageData::new(2, 2, ImageKind::Grayscale1Bpp, vec![0x80u8, 0x40]))
}

/// `save, transform, <paint>, restore` for one image.
pub fn image_group(paint: OpCode, image: &Arc<ImageData>, transform: Args) -> Vec<(OpCode, Args)> {
    vec![
        (OpCode::SAVE, Vec::new()),
        (OpCode::TRANSFORM, transform),
        (paint, vec![Arg::Image(Arc::clone(image))]),
        (OpCode::RESTORE, Vec::new()),
    ]
}

/// `beginText, setFont, setTextMatrix, showText, endText`.
pub fn text_group(font: &str, size: f64, x: f64, text: &str) -> Vec<(OpCode, Args)> {
    vec![
        (OpCode::BEGIN_TEXT, Vec::new()),
        (OpCode::SET_FONT, vec![Arg::name(font), Arg::Number(size)]),
        (OpCode::SET_TEXT_MATRIX, scale_translate(1.0, 1.0, x, 700.0)),
        (
            OpCode::SHOW_TEXT,
            vec![Arg::String(text.as_bytes().to_vec().into())],
        ),
        (OpCode::END_TEXT, Vec::new()),
    ]
}

pub fn display_options() -> OperatorListOptions {
    OperatorListOptions {
        intent: RenderIntent::Display,
        ..Default::default()
    }
}

/// Streams `ops` through a list with `options`, returning the reassembled
/// output and the number of chunks.
pub fn stream_ops(ops: &[(OpCode, Args)], options: OperatorListOptions) -> (OperatorListIR, usize) {
    let assembler = OperatorListAssembler::new();
    let mut list = OperatorList::with_sink(assembler.clone(), options);
    for (op, args) in ops.iter().cloned() {
        list.add_op(op, args);
    }
    list.flush(true).unwrap();
    assert!(assembler.is_complete());
    (assembler.take(), assembler.chunk_count())
}

pub fn optimized(ops: &[(OpCode, Args)]) -> OperatorListIR {
    stream_ops(ops, display_options()).0
}

pub fn raw(ops: &[(OpCode, Args)]) -> OperatorListIR {
    stream_ops(
        ops,
        OperatorListOptions {
            intent: RenderIntent::OpList,
            ..Default::default()
        },
    )
    .0
}
