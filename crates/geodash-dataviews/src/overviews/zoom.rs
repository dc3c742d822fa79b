use geodash_core::Result;

use crate::filter::BBox;

/// Scale denominator of zoom level 0 for 256 px tiles.
const ZOOM_ZERO_SCALE: f64 = 559_082_264.028;
/// Scales above this have no zoom level.
const MAX_SCALE: f64 = 600_000_000.0;
/// Standard rendering pixel size in meters (0.28 mm).
const PIXEL_SIZE: f64 = 0.00028;

/// Zoom level for a scale denominator, `None` when the scale has no zoom.
pub fn zoom_from_scale(scale: f64) -> Option<i32> {
    if !scale.is_finite() || scale <= 0.0 || scale > MAX_SCALE {
        return None;
    }
    Some((ZOOM_ZERO_SCALE / scale).log2().round() as i32)
}

/// Scale denominator for showing `bbox` across a `tile_size` pixel viewport.
///
/// The width is measured on the normalized box, so a box crossing the
/// antimeridian spans only the longitudes it actually covers.
pub fn scale_for_bbox(bbox: &BBox, tile_size: u32) -> f64 {
    let width: f64 = bbox
        .normalized()
        .iter()
        .map(|part| {
            let [minx, _, maxx, _] = part.to_webmercator();
            maxx - minx
        })
        .sum();
    width / f64::from(tile_size.max(1)) / PIXEL_SIZE
}

/// Zoom level implied by a raw request bbox. No bbox means no zoom.
pub fn zoom_for_bbox(raw: Option<&str>, tile_size: u32) -> Result<Option<i32>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let bbox = BBox::parse(raw)?;
    Ok(zoom_from_scale(scale_for_bbox(&bbox, tile_size)))
}
