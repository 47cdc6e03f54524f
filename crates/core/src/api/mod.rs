//! Public rendering entry points.
//!
//! - `page`: the evaluator boundary and single-page production
//! - `stream`: concurrent multi-page production with ordered delivery

pub mod page;
pub mod stream;

pub use page::{ContentEvaluator, RenderOptions, get_operator_list, render_page};
pub use stream::{OperatorListStream, render_pages_stream};
