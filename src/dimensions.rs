//! Target size calculation for the compressor.

/// Fits `(width, height)` inside `max_width` x `max_height`, keeping the
/// aspect ratio.
///
/// The clamp is sequential: width first, then the (possibly already scaled)
/// height. Both results are rounded only at the end, so an image that exceeds
/// both bounds lands on exactly the same numbers as a browser canvas resize.
///
/// ```
/// # use studio_media_rs::dimensions::calculate_dimensions;
/// assert_eq!(calculate_dimensions(4000, 2000, 1920, 1080), (1920, 960));
/// assert_eq!(calculate_dimensions(1000, 3000, 1920, 1080), (360, 1080));
/// ```
pub fn calculate_dimensions(
    original_width: u32,
    original_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    let mut width = original_width as f64;
    let mut height = original_height as f64;
    let max_width = max_width as f64;
    let max_height = max_height as f64;

    if width > max_width {
        height = height * max_width / width;
        width = max_width;
    }

    if height > max_height {
        width = width * max_height / height;
        height = max_height;
    }

    (width.round() as u32, height.round() as u32)
}

/// True when both axes already fit.
pub fn fits_within(width: u32, height: u32, max_width: u32, max_height: u32) -> bool {
    width <= max_width && height <= max_height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_clamp_only() {
        assert_eq!(calculate_dimensions(4000, 2000, 1920, 1080), (1920, 960));
    }

    #[test]
    fn test_height_clamp_only() {
        assert_eq!(calculate_dimensions(1000, 3000, 1920, 1080), (360, 1080));
    }

    #[test]
    fn test_both_axes_clamped_in_order() {
        // width pass leaves 1920x1440, height pass brings it to 1440x1080
        assert_eq!(calculate_dimensions(4000, 3000, 1920, 1080), (1440, 1080));
        assert_eq!(calculate_dimensions(3000, 3000, 1600, 1200), (1200, 1200));
    }

    #[test]
    fn test_within_bounds_unchanged() {
        assert_eq!(calculate_dimensions(800, 600, 1920, 1080), (800, 600));
        assert_eq!(calculate_dimensions(1920, 1080, 1920, 1080), (1920, 1080));
        assert!(fits_within(1920, 1080, 1920, 1080));
        assert!(!fits_within(1921, 1080, 1920, 1080));
    }

    #[test]
    fn test_rounding() {
        // 1080 * 1920 / 2001 = 1036.28...
        assert_eq!(calculate_dimensions(2001, 1080, 1920, 1080), (1920, 1036));
        // 1333 * 1080 / 1999 = 720.18...
        assert_eq!(calculate_dimensions(1333, 1999, 1920, 1080), (720, 1080));
    }

    #[test]
    fn test_extreme_aspect_can_round_to_zero() {
        assert_eq!(calculate_dimensions(5000, 40, 10, 10), (10, 0));
    }

    #[test]
    fn test_never_exceeds_bounds() {
        let bounds = [(1920, 1080), (1600, 1200), (640, 480), (100, 1000)];
        for (w, h) in [(4000, 2000), (1000, 3000), (7000, 7000), (12, 9000), (9000, 12)] {
            for (mw, mh) in bounds {
                let (tw, th) = calculate_dimensions(w, h, mw, mh);
                assert!(tw <= mw && th <= mh, "{}x{} in {}x{} gave {}x{}", w, h, mw, mh, tw, th);
            }
        }
    }
}
