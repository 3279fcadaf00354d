mod batch;
mod document;
mod page;

pub use batch::{BatchFailure, BatchPipeline, BatchReport, ProducedPage};
pub use page::{PageOptions, PagePipeline, PageReport};
