//! Reference document rasterization seam.
//!
//! Rendering PDF/PPTX pages is left to the caller; the pipeline only needs
//! an ordered list of page images per source.

use async_trait::async_trait;

use slidesync_models::{ReferenceSlide, SourceId};

use crate::error::{MediaError, MediaResult};

/// Renders a reference document into one image per page.
#[async_trait]
pub trait SlideRasterizer: Send + Sync {
    /// Rasterize `document` as `source_id`. Pages must come back ascending,
    /// 1-based and unique, each capped at the rasterizer's maximum width.
    async fn rasterize(&self, document: &[u8], source_id: SourceId) -> MediaResult<Vec<ReferenceSlide>>;
}

/// Check a rasterizer's output: right source, ascending unique 1-based pages.
pub fn validate_slides(slides: &[ReferenceSlide], source_id: SourceId) -> MediaResult<()> {
    let mut previous = 0u32;
    for slide in slides {
        if slide.source_id != source_id {
            return Err(MediaError::rasterization(format!(
                "page {} tagged as source {}, expected source {}",
                slide.page_number, slide.source_id, source_id
            )));
        }
        if slide.page_number <= previous {
            return Err(MediaError::rasterization(format!(
                "source {} pages out of order: {} after {}",
                source_id, slide.page_number, previous
            )));
        }
        previous = slide.page_number;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidesync_models::ImageData;

    fn slide(source_id: SourceId, page: u32) -> ReferenceSlide {
        ReferenceSlide::new(source_id, page, ImageData::jpeg(vec![], 1, 1))
    }

    #[test]
    fn test_valid_slides() {
        let slides = vec![slide(SourceId::First, 1), slide(SourceId::First, 2)];
        assert!(validate_slides(&slides, SourceId::First).is_ok());
        assert!(validate_slides(&[], SourceId::Second).is_ok());
    }

    #[test]
    fn test_rejects_wrong_source() {
        let slides = vec![slide(SourceId::Second, 1)];
        assert!(matches!(
            validate_slides(&slides, SourceId::First),
            Err(MediaError::Rasterization(_))
        ));
    }

    #[test]
    fn test_rejects_page_zero_and_duplicates() {
        assert!(validate_slides(&[slide(SourceId::First, 0)], SourceId::First).is_err());
        let dupes = vec![slide(SourceId::First, 1), slide(SourceId::First, 1)];
        assert!(validate_slides(&dupes, SourceId::First).is_err());
    }
}
