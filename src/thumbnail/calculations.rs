//! Pure calculation functions for thumbnail dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale `source` down to fit inside `bounds`, preserving aspect ratio.
///
/// Pages already inside the box keep their size (no upscaling). Neither
/// output edge drops below one pixel.
///
/// ```
/// # use notes_shelf::thumbnail::fit_within;
/// // A4 page at 72 dpi into a 300x400 box → width-bound
/// assert_eq!(fit_within((595, 842), (300, 400)), (283, 400));
///
/// // Landscape slide → width-bound
/// assert_eq!(fit_within((960, 540), (300, 400)), (300, 169));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    if src_w == 0 || src_h == 0 {
        return (src_w.max(1), src_h.max(1));
    }
    if src_w <= max_w && src_h <= max_h {
        return (src_w, src_h);
    }

    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h)
}
