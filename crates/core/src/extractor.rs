use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;

/// Raw text of one PDF page. Page numbers are 1-based. The text may be
/// empty; the pipeline decides what to do with blank pages.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// A page whose text could not be extracted. The rest of the document is
/// still usable.
#[derive(Debug, Clone)]
pub struct FailedPage {
    pub number: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedPages {
    pub pages: Vec<PageText>,
    pub failed: Vec<FailedPage>,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<ExtractedPages, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<ExtractedPages, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut extracted = ExtractedPages::default();
        for (page_no, _page_id) in document.get_pages() {
            match document.extract_text(&[page_no]) {
                Ok(text) => extracted.pages.push(PageText {
                    number: page_no,
                    text,
                }),
                Err(error) => extracted.failed.push(FailedPage {
                    number: page_no,
                    reason: error.to_string(),
                }),
            }
        }

        Ok(extracted)
    }
}
