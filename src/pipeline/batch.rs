use futures_util::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::document::assemble_document;
use super::page::{PagePipeline, PageReport};
use crate::error::PipelineError;
use crate::translate::Translator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedPage {
    pub index: usize,
    pub source: PathBuf,
    pub report: PageReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub index: usize,
    pub source: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub pages: Vec<ProducedPage>,
    pub failures: Vec<BatchFailure>,
}

/// A rendered page waiting to be placed in the document, kept as encoded PNG.
pub(crate) struct StagedPage {
    pub(crate) page: ProducedPage,
    pub(crate) png: Vec<u8>,
}

/// Runs the page pipeline over many images and collects the results into one PDF.
pub struct BatchPipeline<T: Translator> {
    page: PagePipeline<T>,
    concurrency: usize,
}

impl<T: Translator> BatchPipeline<T> {
    pub fn new(page: PagePipeline<T>, concurrency: usize) -> Self {
        Self {
            page,
            concurrency: concurrency.max(1),
        }
    }

    pub fn page_pipeline(&self) -> &PagePipeline<T> {
        &self.page
    }

    /// A page that fails is logged and skipped; the document keeps input order.
    pub async fn process_batch(
        &self,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<BatchReport, PipelineError> {
        if inputs.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let staging = tempfile::tempdir().map_err(|source| PipelineError::Write {
            path: std::env::temp_dir(),
            source,
        })?;

        let (staged, failures) = self.stage_pages(inputs, staging.path()).await;
        if staged.is_empty() {
            return Err(PipelineError::NoPagesProduced {
                attempted: inputs.len(),
            });
        }

        let pages: Vec<ProducedPage> = staged.iter().map(|page| page.page.clone()).collect();
        let title = output
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("translated")
            .to_string();
        let target = output.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let pdf = assemble_document(&title, &staged)?;
            std::fs::write(&target, pdf).map_err(|source| PipelineError::Write {
                path: target.clone(),
                source,
            })
        })
        .await
        .map_err(|err| PipelineError::Worker {
            path: output.to_path_buf(),
            message: err.to_string(),
        })??;
        info!(
            "wrote {} page(s) to {} ({} skipped)",
            pages.len(),
            output.display(),
            failures.len()
        );

        Ok(BatchReport { pages, failures })
    }

    /// Processes every input into `staging`, bounded by the page concurrency. Results come
    /// back in input order whatever order they complete in.
    pub(crate) async fn stage_pages(
        &self,
        inputs: &[PathBuf],
        staging: &Path,
    ) -> (Vec<StagedPage>, Vec<BatchFailure>) {
        let results: Vec<_> = stream::iter(inputs.iter().enumerate())
            .map(|(index, source)| async move {
                let staged_path = staging.join(format!("page-{:04}.png", index));
                let result = match self.page.process_page(source, &staged_path).await {
                    Ok(report) => std::fs::read(&staged_path)
                        .map(|png| (report, png))
                        .map_err(|source| PipelineError::Write {
                            path: staged_path.clone(),
                            source,
                        }),
                    Err(err) => Err(err),
                };
                (index, source, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut staged = Vec::new();
        let mut failures = Vec::new();
        for (index, source, result) in results {
            match result {
                Ok((report, png)) => staged.push(StagedPage {
                    page: ProducedPage {
                        index,
                        source: source.clone(),
                        report,
                    },
                    png,
                }),
                Err(err) => {
                    warn!("skipping {}: {}", source.display(), err);
                    failures.push(BatchFailure {
                        index,
                        source: source.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        (staged, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PageOptions;
    use crate::test_util::{
        BlockFont, FixedDetector, MapTranslator, detection, pdf_page_sizes, serve_translate_stub,
    };
    use crate::translate::{GatewayOptions, LibreTranslate, TranslatorGateway};
    use axum::Router;
    use axum::routing::post;
    use image::RgbImage;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn batch(concurrency: usize) -> BatchPipeline<MapTranslator> {
        let page = PagePipeline::new(
            Arc::new(FixedDetector::new(vec![detection(2, 2, 30, 15, "你好", 0.9)])),
            TranslatorGateway::new(MapTranslator::new(&[("你好", "Hi")]), GatewayOptions::default()),
            Arc::new(BlockFont::new(6, 10)),
            PageOptions::default(),
        );
        BatchPipeline::new(page, concurrency)
    }

    fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, image::Rgb([120, 120, 120]))
            .save(&path)
            .unwrap();
        path
    }

    fn translated_once() -> PageReport {
        PageReport {
            regions_detected: 1,
            regions_rendered: 1,
            translation_fallbacks: 0,
        }
    }

    #[tokio::test]
    async fn empty_input_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let err = batch(2).process_batch(&[], &output).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn broken_page_is_skipped_and_order_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 40, 30);
        let b = dir.path().join("b.png");
        std::fs::write(&b, b"this is not a png").unwrap();
        let c = write_image(dir.path(), "c.jpg", 60, 20);
        let output = dir.path().join("out.pdf");
        let inputs = vec![a.clone(), b.clone(), c.clone()];

        let report = batch(3).process_batch(&inputs, &output).await.unwrap();
        assert_eq!(
            report.pages,
            vec![
                ProducedPage {
                    index: 0,
                    source: a,
                    report: translated_once(),
                },
                ProducedPage {
                    index: 2,
                    source: c,
                    report: translated_once(),
                }
            ]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].source, b);
        assert!(report.failures[0].error.contains("decode"));

        // Two pages, a then c, each sized to its image.
        let pdf = std::fs::read(&output).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(String::from_utf8_lossy(&pdf).contains("/Count 2"));
        assert_eq!(pdf_page_sizes(&pdf), vec![(40.0, 30.0), (60.0, 20.0)]);
    }

    #[tokio::test]
    async fn staged_pages_are_translated_and_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let inputs = vec![
            write_image(dir.path(), "one.png", 40, 30),
            dir.path().join("missing.png"),
            write_image(dir.path(), "three.png", 60, 20),
            write_image(dir.path(), "four.bmp", 35, 25),
        ];

        let (staged, failures) = batch(4).stage_pages(&inputs, staging.path()).await;
        let sizes: Vec<(u32, u32)> = staged
            .iter()
            .map(|page| {
                let image = image::load_from_memory(&page.png).unwrap();
                (image.width(), image.height())
            })
            .collect();
        assert_eq!(sizes, vec![(40, 30), (60, 20), (35, 25)]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);

        // Every staged page went through compositing: the box was erased.
        for page in &staged {
            let image = image::load_from_memory(&page.png).unwrap().to_rgb8();
            assert_eq!(image.get_pixel(3, 3).0, [255, 255, 255]);
            assert_eq!(image.get_pixel(0, 0).0, [120, 120, 120]);
        }
    }

    #[tokio::test]
    async fn slow_detection_does_not_time_out_other_pages_translations() {
        let app = Router::new().route(
            "/translate",
            post(|| async { axum::Json(json!({ "translatedText": "Hi" })) }),
        );
        let endpoint = serve_translate_stub(app).await;
        let backend = LibreTranslate::new(endpoint, Duration::from_millis(500)).unwrap();
        let page = PagePipeline::new(
            Arc::new(
                FixedDetector::new(vec![detection(2, 2, 30, 15, "你好", 0.9)])
                    .with_delay(Duration::from_millis(800)),
            ),
            TranslatorGateway::new(backend, GatewayOptions::default()),
            Arc::new(BlockFont::new(6, 10)),
            PageOptions::default(),
        );
        let batch = BatchPipeline::new(page, 3);

        let dir = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let inputs: Vec<PathBuf> = (0..3)
            .map(|index| write_image(dir.path(), &format!("p{}.png", index), 40, 30))
            .collect();
        let (staged, failures) = batch.stage_pages(&inputs, staging.path()).await;
        assert!(failures.is_empty());
        let reports: Vec<PageReport> = staged.iter().map(|page| page.page.report).collect();
        assert_eq!(reports, vec![translated_once(); 3]);
    }

    #[tokio::test]
    async fn all_pages_failing_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let inputs = vec![dir.path().join("x.png"), dir.path().join("y.png")];
        let err = batch(1).process_batch(&inputs, &output).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoPagesProduced { attempted: 2 }));
        assert!(!output.exists());
    }
}
