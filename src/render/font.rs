use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Transform;
use ttf_parser::{Face, name_id};
use usvg::{Options, Tree, fontdb};

use super::Rgb;
use super::canvas::Canvas;
use super::compose::PlacedLine;

/// Pixel metrics used by the line wrapper and the layout.
pub trait TextMeasure {
    fn text_width(&self, text: &str) -> f32;
    fn line_height(&self) -> i32;
}

/// A font that can also draw laid-out lines onto a canvas.
pub trait TextPainter: TextMeasure + Send + Sync {
    fn draw_lines(&self, canvas: &mut Canvas, lines: &[PlacedLine], color: Rgb) -> Result<()>;
}

/// One fixed-size face, loaded once per run and shared by every page.
#[derive(Clone)]
pub struct OverlayFont {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: String,
    size_px: f32,
    fontdb: Arc<fontdb::Database>,
}

impl std::fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayFont")
            .field("family", &self.family)
            .field("size_px", &self.size_px)
            .field("face_index", &self.face_index)
            .finish()
    }
}

impl OverlayFont {
    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn size_px(&self) -> f32 {
        self.size_px
    }

    fn scale(&self) -> f32 {
        self.size_px / self.units_per_em.max(1) as f32
    }

    fn ascent_px(&self) -> f32 {
        self.ascender as f32 * self.scale()
    }
}

impl TextMeasure for OverlayFont {
    fn text_width(&self, text: &str) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return 0.0;
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance as f32 * self.scale()
    }

    fn line_height(&self) -> i32 {
        let units = self.ascender as i32 - self.descender as i32;
        ((units as f32 * self.scale()).ceil() as i32).max(1)
    }
}

impl TextPainter for OverlayFont {
    fn draw_lines(&self, canvas: &mut Canvas, lines: &[PlacedLine], color: Rgb) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = canvas.width(),
            h = canvas.height()
        );
        let family = escape_xml(&self.family);
        let fill = color.to_hex();
        for line in lines {
            svg.push_str(&format!(
                r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="{fill}" xml:space="preserve">{text}</text>"#,
                x = line.x,
                y = line.y as f32 + self.ascent_px(),
                size = self.size_px,
                family = family,
                fill = fill,
                text = escape_xml(&line.text)
            ));
        }
        svg.push_str("</svg>");

        let options = Options {
            fontdb: self.fontdb.clone(),
            font_family: self.family.clone(),
            ..Options::default()
        };
        let tree = Tree::from_str(&svg, &options).with_context(|| "failed to parse text overlay")?;
        let mut pixmap = canvas.pixmap_mut();
        resvg::render(&tree, Transform::identity(), &mut pixmap);
        Ok(())
    }
}

pub fn load_overlay_font(path: &Path, size_px: f32) -> Result<OverlayFont> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_from_data(data, None, size_px)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// Picks the overlay font: an explicit file, then a named system family, then the first
/// fallback family that exists.
pub fn resolve_overlay_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
    size_px: f32,
) -> Result<OverlayFont> {
    if size_px <= 0.0 {
        return Err(anyhow!("font size must be positive (got {})", size_px));
    }
    if let Some(path) = font_path {
        return load_overlay_font(path, size_px);
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        return load_font_from_family(&db, family, size_px);
    }

    for candidate in fallback {
        if let Ok(font) = load_font_from_family(&db, candidate, size_px) {
            return Ok(font);
        }
    }

    Err(anyhow!(
        "no overlay font found (tried {}); set overlay.font_path",
        fallback.join(", ")
    ))
}

fn load_font_from_data(
    data: Vec<u8>,
    preferred_family: Option<&str>,
    size_px: f32,
) -> Result<OverlayFont> {
    let data = Arc::new(data);
    let mut fontdb = fontdb::Database::new();
    fontdb.load_font_data(data.as_ref().clone());
    let fontdb = Arc::new(fontdb);

    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(&data, index) else {
            continue;
        };
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let family = extract_family_name(&face).unwrap_or_else(|| "sans-serif".to_string());
        let font = OverlayFont {
            data: data.clone(),
            face_index: index,
            units_per_em,
            space_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            family,
            size_px,
            fontdb: fontdb.clone(),
        };
        if let Some(preferred) = preferred_family {
            if font.family.eq_ignore_ascii_case(preferred) {
                return Ok(font);
            }
        }
        if fallback.is_none() {
            fallback = Some(font);
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_from_family(db: &fontdb::Database, family: &str, size_px: f32) -> Result<OverlayFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let preferred = if family.eq_ignore_ascii_case("sans-serif") {
        None
    } else {
        Some(family)
    };
    load_font_from_data(data, preferred, size_px)
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
