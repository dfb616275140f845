// Point locator - nearest chart point to a cursor position
use crate::domain::telemetry::ChartPoint;

/// Residual window scanned linearly after binary narrowing.
const SCAN_WINDOW: usize = 6;

/// Closest point to `target_x` in a series sorted by `x`. Equal distances
/// resolve to the earlier point.
pub fn nearest(points: &[ChartPoint], target_x: f64) -> Option<&ChartPoint> {
    if points.is_empty() {
        return None;
    }

    let (mut lo, mut hi) = (0, points.len() - 1);
    while hi - lo > SCAN_WINDOW {
        let mid = lo + (hi - lo) / 2;
        if points[mid].x < target_x {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let mut best = lo;
    let mut best_dist = f64::INFINITY;
    for (i, p) in points.iter().enumerate().take(hi + 1).skip(lo) {
        let d = (p.x - target_x).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    points.get(best)
}

/// Map a pointer position in pixels to the logical chart width.
pub fn pixel_to_logical(px: f64, rendered_width: f64, logical_width: f64) -> f64 {
    if rendered_width > 0.0 {
        px.clamp(0.0, rendered_width) / rendered_width * logical_width
    } else {
        0.0
    }
}
