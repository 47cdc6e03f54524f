//! The slice of the page model this crate needs: a page's content and its
//! annotations, each decoded by an external evaluator.

pub mod annotation;

pub use annotation::{
    Annotation, AnnotationAppearance, AnnotationFlags, append_annotations, transform_matrix,
};

use crate::api::ContentEvaluator;

/// One page ready for operator list production.
pub struct Page {
    /// Zero-based page index.
    pub index: usize,
    pub content: Box<dyn ContentEvaluator + Send>,
    pub annotations: Vec<Annotation>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .field("annotations", &self.annotations)
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn new(index: usize, content: impl ContentEvaluator + Send + 'static) -> Self {
        Self {
            index,
            content: Box::new(content),
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}
