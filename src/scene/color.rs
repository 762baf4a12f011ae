//! Material colour to CSS `rgba(...)` strings.

/// Used when a volume has no material, or the material has no usable colour.
pub const FALLBACK_RGBA: &str = "rgba(150,150,150,0.25)";

/// Alpha applied when the colour carries none and no override is given.
const DEFAULT_ALPHA: f64 = 0.3;

/// Format `[r, g, b, a?]` as `rgba(r,g,b,a)`.
///
/// A channel `<= 1` is read as normalized and scaled to 0..=255, anything larger is taken
/// as already in byte range. `alpha_override` replaces the material's own alpha so the scene
/// can dim every surface without touching material definitions.
pub fn rgba_string(color: Option<&[f64]>, alpha_override: Option<f64>) -> String {
    let Some(c) = color.filter(|c| c.len() >= 3) else {
        return FALLBACK_RGBA.to_string();
    };
    let (r, g, b) = (channel(c[0]), channel(c[1]), channel(c[2]));
    let a = alpha_override.unwrap_or_else(|| c.get(3).copied().unwrap_or(DEFAULT_ALPHA));
    format!("rgba({r},{g},{b},{a})")
}

// Truncates like an integer cast; out-of-range values saturate.
fn channel(value: f64) -> u8 {
    if value <= 1.0 {
        (value * 255.0) as u8
    } else {
        value as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_channels_are_scaled() {
        assert_eq!(
            rgba_string(Some(&[1.0, 0.5, 0.0, 0.4]), None),
            "rgba(255,127,0,0.4)"
        );
    }

    #[test]
    fn byte_channels_pass_through() {
        assert_eq!(
            rgba_string(Some(&[200.0, 100.0, 50.0]), None),
            "rgba(200,100,50,0.3)"
        );
    }

    #[test]
    fn override_beats_material_alpha() {
        assert_eq!(
            rgba_string(Some(&[0.0, 0.0, 1.0, 0.9]), Some(0.15)),
            "rgba(0,0,255,0.15)"
        );
    }

    #[test]
    fn missing_or_short_colour_falls_back_to_gray() {
        assert_eq!(rgba_string(None, Some(0.15)), FALLBACK_RGBA);
        assert_eq!(rgba_string(Some(&[0.1, 0.2]), None), FALLBACK_RGBA);
        assert_eq!(rgba_string(Some(&[]), None), FALLBACK_RGBA);
    }
}
