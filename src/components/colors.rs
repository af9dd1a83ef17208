use image::Rgba;

use crate::error::{CanvasError, Result};

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Quick-pick swatches: two rows of classic paint colours and a grey ramp.
pub const PALETTE: [&str; 30] = [
    "#000000", "#7f7f7f", "#880015", "#ed1c24", "#ff7f27", "#fff200", "#22b14c", "#00a2e8",
    "#3f48cc", "#a349a4", "#ffffff", "#c3c3c3", "#b97a57", "#ffaec9", "#ffc90e", "#efe4b0",
    "#b5e61d", "#99d9ea", "#7092be", "#c8bfe7", "#1a1a1a", "#333333", "#4d4d4d", "#666666",
    "#999999", "#b3b3b3", "#cccccc", "#e6e6e6", "#f2f2f2", "#ffffff",
];

// ============================================================================
// ColorPair – primary / secondary paint colours
// ============================================================================

/// The two active colours. Primary paints with the left button; secondary is
/// the eraser colour, the right-button colour and the clear/resize background.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorPair {
    pub primary: Rgba<u8>,
    pub secondary: Rgba<u8>,
}

impl Default for ColorPair {
    fn default() -> Self {
        Self {
            primary: BLACK,
            secondary: WHITE,
        }
    }
}

impl ColorPair {
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.primary, &mut self.secondary);
    }

    /// Colour for a pointer gesture; the secondary button paints with the
    /// secondary colour.
    pub fn for_button(&self, secondary_button: bool) -> Rgba<u8> {
        if secondary_button { self.secondary } else { self.primary }
    }
}

// -- Hex conversions --------------------------------------------

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Result<Rgba<u8>> {
    let hex = s.trim().trim_start_matches('#');
    let bad = || CanvasError::InvalidColor(s.to_string());
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad());
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
    match hex.len() {
        3 => {
            let nib = |i: usize| {
                u8::from_str_radix(&hex[i..i + 1], 16)
                    .map(|v| v * 17)
                    .map_err(|_| bad())
            };
            Ok(Rgba([nib(0)?, nib(1)?, nib(2)?, 255]))
        }
        6 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => Err(bad()),
    }
}

/// Lowercase `#rrggbb`; alpha is ignored, matching what the picker reports.
pub fn to_hex(color: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Palette entry by index.
pub fn palette_color(index: usize) -> Option<Rgba<u8>> {
    PALETTE.get(index).and_then(|hex| parse_hex_color(hex).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!(parse_hex_color("#ff0000").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_hex_color("0f0").unwrap(), Rgba([0, 255, 0, 255]));
        assert_eq!(parse_hex_color("#00000080").unwrap(), Rgba([0, 0, 0, 128]));
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
        assert!(parse_hex_color("").is_err());
    }

    #[test]
    fn hex_is_lowercase_rgb() {
        assert_eq!(to_hex(Rgba([255, 174, 201, 10])), "#ffaec9");
    }

    #[test]
    fn palette_is_parseable() {
        for i in 0..PALETTE.len() {
            assert!(palette_color(i).is_some());
        }
        assert_eq!(palette_color(0), Some(BLACK));
        assert_eq!(palette_color(30), None);
    }

    #[test]
    fn swap_exchanges() {
        let mut pair = ColorPair::default();
        pair.swap();
        assert_eq!(pair.primary, WHITE);
        assert_eq!(pair.for_button(true), BLACK);
    }
}
