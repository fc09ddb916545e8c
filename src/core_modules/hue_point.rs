use crate::core_modules::color::{Hue, Rgb};

/// A single weighted hue observation extracted from one sampled pixel.
///
/// The weight is the perceptual salience of the sample: saturation times the
/// square of the value. Squaring the value pushes dim pixels toward zero, so
/// dark and washed-out regions barely vote. Points are created per sample,
/// consumed by the histogram and delta tracker, and never persisted beyond
/// one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuePoint {
    /// Circular hue in [0, 1).
    pub hue: Hue,
    /// Non-negative perceptual weight.
    pub weight: f64,
}

impl HuePoint {
    pub fn from_rgb(rgb: Rgb) -> Self {
        let (hue, saturation, value) = rgb.to_hsv();
        HuePoint {
            hue,
            weight: (saturation * value * value) as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn saturated_bright_pixels_carry_full_weight() {
        let point = HuePoint::from_rgb(Rgb::new(255, 0, 0));
        assert_abs_diff_eq!(point.weight, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(point.hue, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn dim_pixels_are_quadratically_suppressed() {
        // Same saturation, half the value: weight drops to a quarter.
        let bright = HuePoint::from_rgb(Rgb::new(255, 0, 0));
        let dim = HuePoint::from_rgb(Rgb::new(128, 0, 0));
        let ratio = dim.weight / bright.weight;
        assert!((ratio - 0.25).abs() < 0.01, "ratio was {ratio}");
    }

    #[test]
    fn gray_pixels_have_zero_weight() {
        assert_eq!(HuePoint::from_rgb(Rgb::new(77, 77, 77)).weight, 0.0);
        assert_eq!(HuePoint::from_rgb(Rgb::BLACK).weight, 0.0);
    }
}
