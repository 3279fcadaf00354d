use anyhow::Result;
use serde::Serialize;

use super::canvas::Canvas;
use super::font::{TextMeasure, TextPainter};
use super::wrap::wrap_text;
use super::OverlayStyle;
use crate::region::{BoundingBox, TranslatedRegion};

/// A wrapped line with its top-left drawing position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
}

/// Wraps `text` to the box width and centres the block in both directions.
///
/// The block may start above the box when it is taller than the box; that overflow is
/// left as is.
pub fn layout_lines<M: TextMeasure + ?Sized>(
    bbox: &BoundingBox,
    text: &str,
    measure: &M,
) -> Vec<PlacedLine> {
    let wrapped = wrap_text(text, measure, bbox.width() as f32);
    let line_height = measure.line_height();
    let total_height = wrapped.len() as i32 * line_height;
    let mut y = bbox.top + (bbox.height() - total_height).div_euclid(2);

    let mut placed = Vec::with_capacity(wrapped.len());
    for line in wrapped {
        let width = measure.text_width(&line).round() as i32;
        let x = bbox.left + (bbox.width() - width).div_euclid(2);
        placed.push(PlacedLine {
            text: line,
            x,
            y,
            width,
        });
        y += line_height;
    }
    placed
}

/// Erases the region's box and draws its translated text centred inside it.
pub fn composite_region<P: TextPainter + ?Sized>(
    canvas: &mut Canvas,
    translated: &TranslatedRegion,
    painter: &P,
    style: &OverlayStyle,
) -> Result<Vec<PlacedLine>> {
    let bbox = translated.region.bounding_box;
    canvas.fill_rect(&bbox, style.fill);
    let lines = layout_lines(&bbox, &translated.translated_text, painter);
    painter.draw_lines(canvas, &lines, style.text)?;
    Ok(lines)
}
