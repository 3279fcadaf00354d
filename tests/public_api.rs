use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use image_text_translator::region::filter_regions;
use image_text_translator::render::{Canvas, PlacedLine, Rgb, wrap_text};
use image_text_translator::translate::{TranslateFuture, TranslationRequest};
use image_text_translator::{
    BatchPipeline, Detection, Detector, GatewayOptions, PageOptions, PagePipeline,
    PipelineError, Quad, TextMeasure, TextPainter, TranslationError, Translator,
    TranslatorGateway,
};

struct Monospace;

impl TextMeasure for Monospace {
    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * 8.0
    }

    fn line_height(&self) -> i32 {
        12
    }
}

impl TextPainter for Monospace {
    fn draw_lines(
        &self,
        _canvas: &mut Canvas,
        _lines: &[PlacedLine],
        _color: Rgb,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

struct OneBox;

impl Detector for OneBox {
    fn detect(&self, _image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        Ok(vec![Detection {
            quad: Quad::from_rect(4, 4, 40, 20),
            text: "你好".to_string(),
            confidence: 0.9,
        }])
    }
}

struct Offline;

impl Translator for Offline {
    fn translate<'a>(&'a self, _request: TranslationRequest<'a>) -> TranslateFuture<'a> {
        Box::pin(async { Err(TranslationError::Backend("offline".to_string())) })
    }
}

fn pipeline() -> PagePipeline<Offline> {
    PagePipeline::new(
        Arc::new(OneBox),
        TranslatorGateway::new(Offline, GatewayOptions::default()),
        Arc::new(Monospace),
        PageOptions::default(),
    )
}

#[test]
fn filter_and_wrap_through_public_api() {
    let regions = filter_regions(
        vec![
            Detection {
                quad: Quad::from_rect(0, 0, 100, 20),
                text: "keep".to_string(),
                confidence: 0.8,
            },
            Detection {
                quad: Quad::from_rect(0, 0, 100, 20),
                text: "drop".to_string(),
                confidence: 0.1,
            },
        ],
        0.4,
    );
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].bounding_box.width(), 100);

    let lines = wrap_text("one two three", &Monospace, 64.0);
    assert_eq!(lines, vec!["one two", "three"]);
}

#[tokio::test]
async fn offline_translator_still_produces_a_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    RgbImage::from_pixel(50, 30, image::Rgb([10, 20, 30]))
        .save(&input)
        .unwrap();
    let output = dir.path().join("out.png");

    let report = pipeline().process_page(&input, &output).await.unwrap();
    assert_eq!(report.regions_rendered, 1);
    assert_eq!(report.translation_fallbacks, 1);

    let out = image::open(&output).unwrap().to_rgb8();
    assert_eq!(out.get_pixel(10, 10).0, [255, 255, 255]);
    assert_eq!(out.get_pixel(45, 25).0, [10, 20, 30]);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("doc.pdf");
    let batch = BatchPipeline::new(pipeline(), 2);
    let inputs: Vec<PathBuf> = Vec::new();
    let err = batch.process_batch(&inputs, &output).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyInput));
    assert!(!output.exists());
}
