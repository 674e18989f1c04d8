use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Curve colours
// ---------------------------------------------------------------------------

/// `n` distinct colours with hues evenly spaced over 0..300°, so the two
/// ends of a sweep never share a hue.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 300.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Colour for single-curve views.
pub const SINGLE_CURVE: Color32 = Color32::LIGHT_BLUE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_length_and_distinct_ends() {
        assert!(generate_palette(0).is_empty());
        let colors = generate_palette(8);
        assert_eq!(colors.len(), 8);
        assert_ne!(colors[0], colors[7]);
    }
}
