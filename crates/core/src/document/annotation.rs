//! Annotation appearance streams spliced into a page's operator list.

use crate::api::{ContentEvaluator, get_operator_list};
use crate::error::Result;
use crate::model::{Arg, OpCode};
use crate::oplist::{OperatorList, RenderIntent};
use crate::utils::{MATRIX_IDENTITY, Matrix, Rect, apply_matrix_rect};
use crate::worker::WorkerTask;

/// Annotation flag bits (PDF 32000-1, 12.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AnnotationFlags(pub u32);

impl AnnotationFlags {
    pub const INVISIBLE: u32 = 0x1;
    pub const HIDDEN: u32 = 0x2;
    pub const PRINT: u32 = 0x4;
    pub const NO_VIEW: u32 = 0x20;

    pub const fn contains(self, bits: u32) -> bool {
        self.0 & bits != 0
    }
}

/// The normal appearance of an annotation: a form whose content is decoded
/// by an evaluator.
pub struct AnnotationAppearance {
    pub bbox: Rect,
    pub matrix: Matrix,
    pub content: Box<dyn ContentEvaluator + Send>,
}

impl AnnotationAppearance {
    /// An appearance with the default unit bounding box and identity matrix.
    pub fn new(content: impl ContentEvaluator + Send + 'static) -> Self {
        Self {
            bbox: (0.0, 0.0, 1.0, 1.0),
            matrix: MATRIX_IDENTITY,
            content: Box::new(content),
        }
    }

    pub fn with_bbox(mut self, bbox: Rect) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = matrix;
        self
    }
}

pub struct Annotation {
    pub rect: Rect,
    pub flags: AnnotationFlags,
    pub appearance: Option<AnnotationAppearance>,
}

impl std::fmt::Debug for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotation")
            .field("rect", &self.rect)
            .field("flags", &self.flags)
            .field("has_appearance", &self.appearance.is_some())
            .finish()
    }
}

impl Annotation {
    pub const fn new(rect: Rect, flags: u32) -> Self {
        Self {
            rect,
            flags: AnnotationFlags(flags),
            appearance: None,
        }
    }

    pub fn with_appearance(mut self, appearance: AnnotationAppearance) -> Self {
        self.appearance = Some(appearance);
        self
    }

    pub const fn is_invisible(&self) -> bool {
        self.flags.contains(AnnotationFlags::INVISIBLE)
    }

    pub const fn is_viewable(&self) -> bool {
        !self.is_invisible()
            && !self
                .flags
                .contains(AnnotationFlags::HIDDEN | AnnotationFlags::NO_VIEW)
    }

    pub const fn is_printable(&self) -> bool {
        !self.is_invisible()
            && self.flags.contains(AnnotationFlags::PRINT)
            && !self.flags.contains(AnnotationFlags::HIDDEN)
    }

    /// Whether the annotation is drawn for `intent`.
    pub const fn is_rendered_for(&self, intent: RenderIntent) -> bool {
        match intent {
            RenderIntent::Print => self.is_printable(),
            RenderIntent::Display | RenderIntent::OpList => self.is_viewable(),
        }
    }

    /// Evaluates the appearance into its own list, wrapped in
    /// `beginAnnotation [rect, transform, matrix]` and `endAnnotation`.
    ///
    /// Without an appearance the list is empty.
    pub fn get_operator_list(&mut self, task: &WorkerTask) -> Result<OperatorList> {
        let mut list = OperatorList::new();
        let Some(appearance) = self.appearance.as_mut() else {
            return Ok(list);
        };
        let transform = transform_matrix(self.rect, appearance.bbox, appearance.matrix);
        list.add_op(
            OpCode::BEGIN_ANNOTATION,
            vec![
                Arg::Rect(self.rect),
                Arg::Matrix(transform),
                Arg::Matrix(appearance.matrix),
            ],
        );
        let evaluated = get_operator_list(appearance.content.as_mut(), &mut list, task);
        appearance.content.reset();
        evaluated?;
        list.add_op(OpCode::END_ANNOTATION, Vec::new());
        Ok(list)
    }
}

/// Maps the appearance's transformed bounding box onto the annotation rect.
pub fn transform_matrix(rect: Rect, bbox: Rect, matrix: Matrix) -> Matrix {
    let (min_x, min_y, max_x, max_y) = apply_matrix_rect(matrix, bbox);
    if min_x == max_x || min_y == max_y {
        // Degenerate box: only move to the rect origin.
        return (1.0, 0.0, 0.0, 1.0, rect.0, rect.1);
    }
    let x_ratio = (rect.2 - rect.0) / (max_x - min_x);
    let y_ratio = (rect.3 - rect.1) / (max_y - min_y);
    (
        x_ratio,
        0.0,
        0.0,
        y_ratio,
        rect.0 - min_x * x_ratio,
        rect.1 - min_y * y_ratio,
    )
}

/// Appends the annotations drawn for `intent` between `beginAnnotations`
/// and `endAnnotations`.
pub fn append_annotations(
    annotations: &mut [Annotation],
    list: &mut OperatorList,
    task: &WorkerTask,
    intent: RenderIntent,
) -> Result<()> {
    let mut evaluated = Vec::new();
    for annotation in annotations.iter_mut() {
        if annotation.is_rendered_for(intent) {
            evaluated.push(annotation.get_operator_list(task)?);
        }
    }
    list.add_op(OpCode::BEGIN_ANNOTATIONS, Vec::new());
    for sub in evaluated {
        list.add_op_list(sub);
    }
    list.add_op(OpCode::END_ANNOTATIONS, Vec::new());
    Ok(())
}
