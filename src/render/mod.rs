mod canvas;
mod compose;
mod font;
mod wrap;

use anyhow::{Result, anyhow};

pub use canvas::Canvas;
pub use compose::{PlacedLine, composite_region, layout_lines};
pub use font::{OverlayFont, TextMeasure, TextPainter, load_overlay_font, resolve_overlay_font};
pub use wrap::wrap_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Parses `#rrggbb` or `#rgb`.
    pub fn parse_hex(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let hex = trimmed
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("colour '{}' must start with '#'", trimmed))?;
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(anyhow!("colour '{}' is not valid hex", trimmed));
        }
        let expanded = match hex.len() {
            3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
            6 => hex.to_string(),
            _ => return Err(anyhow!("colour '{}' must be #rgb or #rrggbb", trimmed)),
        };
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&expanded[range], 16)
                .map_err(|_| anyhow!("colour '{}' is not valid hex", trimmed))
        };
        Ok(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub fill: Rgb,
    pub text: Rgb,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            fill: Rgb::WHITE,
            text: Rgb::BLACK,
        }
    }
}
