//! Geometric aliases shared by annotation placement and image transforms.

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// A rectangle defined by (x0, y0, x1, y1) where (x0, y0) is typically bottom-left
/// and (x1, y1) is top-right.
pub type Rect = (f64, f64, f64, f64);

/// A 6-element affine transformation matrix (a, b, c, d, e, f).
/// Transforms point (x, y) to (ax + cy + e, bx + dy + f).
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// Identity transformation matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// Applies a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, (x, y): Point) -> Point {
    let (a, b, c, d, e, f) = m;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Returns the bounding rectangle of `rect` after transformation by `m`.
pub fn apply_matrix_rect(m: Matrix, (x0, y0, x1, y1): Rect) -> Rect {
    let corners = [
        apply_matrix_pt(m, (x0, y0)),
        apply_matrix_pt(m, (x0, y1)),
        apply_matrix_pt(m, (x1, y0)),
        apply_matrix_pt(m, (x1, y1)),
    ];
    let mut out = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for (x, y) in corners {
        out.0 = out.0.min(x);
        out.1 = out.1.min(y);
        out.2 = out.2.max(x);
        out.3 = out.3.max(y);
    }
    out
}
