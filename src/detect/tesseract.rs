use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use super::Detector;
use crate::region::{Detection, Quad};

/// Runs the `tesseract` CLI and groups its word boxes into line detections.
#[derive(Debug, Clone)]
pub struct TesseractDetector {
    command: String,
    languages: String,
    psm: u32,
}

impl TesseractDetector {
    pub fn new(command: impl Into<String>, languages: impl Into<String>, psm: u32) -> Self {
        Self {
            command: command.into(),
            languages: languages.into(),
            psm,
        }
    }

    fn run_tsv(&self, path: &Path) -> Result<String> {
        let output = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .with_context(|| format!("failed to run {} (is it installed?)", self.command))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("{} failed: {}", self.command, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Detector for TesseractDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush()
            .with_context(|| "failed to flush temp image for OCR")?;

        let tsv = self.run_tsv(tmp.path())?;
        let detections = parse_tsv_detections(&tsv);
        debug!("tesseract produced {} line(s)", detections.len());
        Ok(detections)
    }
}

struct LineAccumulator {
    key: (i32, i32, i32, i32),
    words: Vec<String>,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    conf_sum: f32,
}

/// Word rows (level 5) grouped by page/block/paragraph/line, in first-seen order.
pub(crate) fn parse_tsv_detections(tsv: &str) -> Vec<Detection> {
    let mut lines: Vec<LineAccumulator> = Vec::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let parse = |value: &str| value.trim().parse::<i32>().unwrap_or(0);
        let key = (parse(cols[1]), parse(cols[2]), parse(cols[3]), parse(cols[4]));
        let left = parse(cols[6]);
        let top = parse(cols[7]);
        let right = left + parse(cols[8]);
        let bottom = top + parse(cols[9]);

        match lines.iter_mut().find(|line| line.key == key) {
            Some(line) => {
                line.words.push(text.to_string());
                line.left = line.left.min(left);
                line.top = line.top.min(top);
                line.right = line.right.max(right);
                line.bottom = line.bottom.max(bottom);
                line.conf_sum += conf;
            }
            None => lines.push(LineAccumulator {
                key,
                words: vec![text.to_string()],
                left,
                top,
                right,
                bottom,
                conf_sum: conf,
            }),
        }
    }

    lines
        .into_iter()
        .map(|line| {
            let confidence = (line.conf_sum / line.words.len() as f32 / 100.0).clamp(0.0, 1.0);
            if confidence == 0.0 {
                warn!("tesseract line {:?} has zero confidence", line.words);
            }
            Detection {
                quad: Quad::from_rect(line.left, line.top, line.right, line.bottom),
                text: join_words(&line.words),
                confidence,
            }
        })
        .collect()
}

/// Joins word tokens with spaces, except between two non-ASCII tokens. Tesseract splits CJK
/// lines into tokens that had no spaces between them on the page.
fn join_words(words: &[String]) -> String {
    let mut text = String::new();
    for word in words {
        let glued = match (text.chars().last(), word.chars().next()) {
            (Some(prev), Some(next)) => !prev.is_ascii() && !next.is_ascii(),
            _ => true,
        };
        if !glued {
            text.push(' ');
        }
        text.push_str(word);
    }
    text
}
