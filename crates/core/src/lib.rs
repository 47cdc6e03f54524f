//! quire - PDF operator list construction, streaming and optimization.
//!
//! An evaluator decodes a page's content stream and appends one operation at a
//! time to an [`OperatorList`]. The list rewrites recognised runs through its
//! queue optimizer, cuts the stream into chunks and hands each chunk to a
//! [`StreamSink`]. Every unit of work runs under a [`WorkerTask`] that can be
//! terminated cooperatively.

pub mod api;
pub mod document;
pub mod error;
pub mod model;
pub mod oplist;
pub mod utils;
pub mod worker;

pub use api::{
    ContentEvaluator, OperatorListStream, RenderOptions, get_operator_list, render_page,
    render_pages_stream,
};
pub use document::{Annotation, AnnotationAppearance, AnnotationFlags, Page};
pub use error::{RenderError, Result};
pub use model::{Arg, Args, ImageData, ImageKind, OpCode};
pub use oplist::{
    ChunkParams, OperatorList, OperatorListChunk, OperatorListIR, OperatorListOptions,
    PatternLimits, RenderIntent, StreamSink, channel,
};
pub use worker::{TaskRegistry, WorkerTask};
