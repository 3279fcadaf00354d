use printpdf::image_crate::{self, DynamicImage};
use printpdf::{
    Image, ImageTransform, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex, PdfPageIndex,
    Pt,
};

use super::batch::StagedPage;
use crate::error::PipelineError;

/// Lays the staged pages out one per PDF page, in the order given. Every page is sized to
/// its image so that one pixel covers one point.
pub(crate) fn assemble_document(title: &str, pages: &[StagedPage]) -> Result<Vec<u8>, PipelineError> {
    let Some((first, rest)) = pages.split_first() else {
        return Err(PipelineError::Document("no pages to assemble".to_string()));
    };

    let image = decode_page(first)?;
    let (width, height) = page_size(&image);
    let (doc, page, layer) = PdfDocument::new(title, width, height, layer_name(first));
    place_image(&doc, page, layer, &image);

    for staged in rest {
        let image = decode_page(staged)?;
        let (width, height) = page_size(&image);
        let (page, layer) = doc.add_page(width, height, layer_name(staged));
        place_image(&doc, page, layer, &image);
    }

    doc.save_to_bytes()
        .map_err(|err| PipelineError::Document(format!("failed to write pdf: {}", err)))
}

fn decode_page(staged: &StagedPage) -> Result<DynamicImage, PipelineError> {
    image_crate::load_from_memory(&staged.png).map_err(|err| {
        PipelineError::Document(format!(
            "page {} ({}) is not a readable image: {}",
            staged.page.index + 1,
            staged.page.source.display(),
            err
        ))
    })
}

fn layer_name(staged: &StagedPage) -> String {
    format!("page {}", staged.page.index + 1)
}

fn page_size(image: &DynamicImage) -> (Mm, Mm) {
    (
        Mm::from(Pt(image.width() as f32)),
        Mm::from(Pt(image.height() as f32)),
    )
}

fn place_image(doc: &PdfDocumentReference, page: PdfPageIndex, layer: PdfLayerIndex, image: &DynamicImage) {
    let layer = doc.get_page(page).get_layer(layer);
    Image::from_dynamic_image(image).add_to_layer(
        layer,
        ImageTransform {
            dpi: Some(72.0),
            ..ImageTransform::default()
        },
    );
}
