use eframe::egui::Color32;
use palette::{LinSrgb, Mix, Srgb};

// ---------------------------------------------------------------------------
// Continuous colour map: value → Color32
// ---------------------------------------------------------------------------

/// Viridis control points, evenly spaced over [0, 1].
const VIRIDIS: [(f32, f32, f32); 5] = [
    (0.267, 0.005, 0.329),
    (0.229, 0.322, 0.546),
    (0.128, 0.567, 0.551),
    (0.369, 0.789, 0.383),
    (0.993, 0.906, 0.144),
];

/// Maps a scalar range onto a perceptually uniform gradient.
#[derive(Debug, Clone)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
    stops: Vec<LinSrgb>,
}

impl ColorScale {
    pub fn new(min: f64, max: f64) -> Self {
        let stops = VIRIDIS
            .iter()
            .map(|&(r, g, b)| Srgb::new(r, g, b).into_linear())
            .collect();
        Self { min, max, stops }
    }

    /// Position of `value` in the range, clamped to [0, 1]. A collapsed
    /// range maps everything to the middle.
    pub fn normalize(&self, value: f64) -> f32 {
        let span = self.max - self.min;
        if span.abs() < f64::EPSILON {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0) as f32
    }

    /// Colour for a value; non-finite values are drawn grey.
    pub fn color_for(&self, value: f64) -> Color32 {
        if !value.is_finite() {
            return Color32::GRAY;
        }
        self.color_at(self.normalize(value))
    }

    /// Colour at fraction `t` of the gradient.
    pub fn color_at(&self, t: f32) -> Color32 {
        let segments = (self.stops.len() - 1) as f32;
        let pos = t.clamp(0.0, 1.0) * segments;
        let idx = (pos.floor() as usize).min(self.stops.len() - 2);
        let mixed = self.stops[idx].mix(self.stops[idx + 1], pos - idx as f32);
        let rgb: Srgb<u8> = Srgb::<f32>::from_linear(mixed).into_format();
        Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_hit_first_and_last_stop() {
        let scale = ColorScale::new(0.0, 10.0);
        let low = scale.color_for(-5.0);
        let high = scale.color_for(10.0);
        assert_eq!(low, scale.color_at(0.0));
        assert_eq!(high, scale.color_at(1.0));
        // viridis runs dark purple → yellow
        assert!(high.r() > low.r());
        assert!(low.b() > low.g());
    }

    #[test]
    fn collapsed_range_maps_to_middle() {
        let scale = ColorScale::new(3.0, 3.0);
        assert_eq!(scale.normalize(3.0), 0.5);
    }

    #[test]
    fn nan_is_grey() {
        let scale = ColorScale::new(0.0, 1.0);
        assert_eq!(scale.color_for(f64::NAN), Color32::GRAY);
    }
}
