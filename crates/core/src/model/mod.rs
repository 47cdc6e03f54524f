//! Operation tags and argument payloads stored in an operator list.
//!
//! - `opcode`: the opaque operation tag and the constants this crate inspects
//! - `args`: argument payloads, image samples and the batched-op payloads

pub mod args;
pub mod opcode;

pub use args::{Arg, Args, ImageData, ImageKind, ImagePlacement, MaskGroupEntry};
pub use opcode::OpCode;
