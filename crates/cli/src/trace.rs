//! JSON operation traces.
//!
//! A trace lists the operations an evaluator would emit for one page:
//!
//! ```json
//! {"page": 0, "ops": [
//!   {"dependency": "F1"},
//!   {"op": "save"},
//!   {"op": "transform", "args": [1, 0, 0, 1, 10, 20]},
//!   {"op": "paintImageXObject", "args": [{"image": {"id": "Im1", "width": 4, "height": 4}}]},
//!   {"op": 11}
//! ]}
//! ```
//!
//! Images with the same `id` share one sample buffer.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use quire_core::{Arg, Args, ContentEvaluator, ImageData, ImageKind, OpCode, OperatorList};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub page: usize,
    pub ops: Vec<TraceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TraceEntry {
    Dependency {
        dependency: String,
    },
    Op {
        op: OpRef,
        #[serde(default)]
        args: Vec<TraceArg>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OpRef {
    Code(u8),
    Name(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TraceArg {
    Null(()),
    Bool(bool),
    Int(i64),
    Number(f64),
    Name(String),
    Image { image: TraceImage },
    Array(Vec<TraceArg>),
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceImageKind {
    Gray1,
    Rgb,
    #[default]
    Rgba,
}

#[derive(Debug, Deserialize)]
pub struct TraceImage {
    pub id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub kind: TraceImageKind,
    /// Byte every sample is set to.
    #[serde(default)]
    pub fill: u8,
    #[serde(default)]
    pub cached: bool,
}

/// One resolved trace entry.
#[derive(Debug, Clone)]
pub enum Step {
    Dependency(String),
    Op(OpCode, Args),
}

impl Trace {
    /// Resolves op names and decodes images.
    pub fn into_steps(self) -> Result<Vec<Step>> {
        let mut images = HashMap::new();
        self.ops
            .into_iter()
            .map(|entry| match entry {
                TraceEntry::Dependency { dependency } => Ok(Step::Dependency(dependency)),
                TraceEntry::Op { op, args } => {
                    let op = resolve_op(op)?;
                    let args = args
                        .into_iter()
                        .map(|arg| convert_arg(arg, &mut images))
                        .collect::<Result<Args>>()?;
                    Ok(Step::Op(op, args))
                }
            })
            .collect()
    }
}

fn resolve_op(op: OpRef) -> Result<OpCode> {
    match op {
        OpRef::Code(code) => Ok(OpCode(code)),
        OpRef::Name(name) => match OpCode::from_name(&name) {
            Some(op) => Ok(op),
            None => bail!("unknown operation name: {name}"),
        },
    }
}

fn convert_arg(arg: TraceArg, images: &mut HashMap<String, Arc<ImageData>>) -> Result<Arg> {
    Ok(match arg {
        TraceArg::Null(()) => Arg::Null,
        TraceArg::Bool(v) => Arg::Bool(v),
        TraceArg::Int(v) => Arg::Int(v),
        TraceArg::Number(v) => Arg::Number(v),
        TraceArg::Name(v) => Arg::name(v),
        TraceArg::Array(items) => Arg::Array(
            items
                .into_iter()
                .map(|item| convert_arg(item, images))
                .collect::<Result<_>>()?,
        ),
        TraceArg::Image { image } => {
            if let Some(existing) = images.get(&image.id) {
                return Ok(Arg::Image(Arc::clone(existing)));
            }
            let decoded = Arc::new(decode_image(&image)?);
            images.insert(image.id, Arc::clone(&decoded));
            Arg::Image(decoded)
        }
    })
}

fn decode_image(image: &TraceImage) -> Result<ImageData> {
    let kind = match image.kind {
        TraceImageKind::Gray1 => ImageKind::Grayscale1Bpp,
        TraceImageKind::Rgb => ImageKind::Rgb24Bpp,
        TraceImageKind::Rgba => ImageKind::Rgba32Bpp,
    };
    if image.width == 0 || image.height == 0 {
        bail!("image {} has an empty size", image.id);
    }
    let len = kind.row_bytes(image.width) * image.height as usize;
    let decoded = ImageData::new(image.width, image.height, kind, vec![image.fill; len]);
    Ok(if image.cached {
        decoded.into_cached()
    } else {
        decoded
    })
}

/// Replays resolved steps, `batch` entries per evaluation step.
pub struct TraceEvaluator {
    steps: Vec<Step>,
    batch: usize,
    pos: usize,
}

impl TraceEvaluator {
    pub fn new(steps: Vec<Step>, batch: usize) -> Self {
        Self {
            steps,
            batch: batch.max(1),
            pos: 0,
        }
    }
}

impl ContentEvaluator for TraceEvaluator {
    fn step(&mut self, list: &mut OperatorList) -> quire_core::Result<bool> {
        if self.pos >= self.steps.len() {
            return Ok(false);
        }
        let end = (self.pos + self.batch).min(self.steps.len());
        for step in &self.steps[self.pos..end] {
            match step {
                Step::Dependency(id) => list.add_dependency(id),
                Step::Op(op, args) => list.add_op(*op, args.clone()),
            }
        }
        self.pos = end;
        Ok(true)
    }

    fn reset(&mut self) {
        self.pos = 0;
    }
}
