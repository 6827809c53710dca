//! Analysis Layer
//!
//! Turns recognized text into document tags.

pub mod tags;
pub mod text;

use tracing::info;

use crate::editor::photo::PhotoItem;
use crate::error::Result;
use crate::vision::ocr::OcrEngine;

pub use tags::{chunk_text, ClassifierConfig, TagClassifier, TagConfig, TagScore, TagTable};
pub use text::{check_keywords, edit_distance, match_score, normalize, similarity, MatchResult, MatchType, MatcherConfig};

/// Run OCR on the photo's display image and classify the text.
///
/// OCR failures propagate; classification itself always yields tags.
pub async fn tag_photo<E>(engine: &E, photo: &PhotoItem, classifier: &TagClassifier) -> Result<Vec<String>>
where
    E: OcrEngine + ?Sized,
{
    let output = engine.recognize(photo.display_image()).await?;
    let tags = classifier.generate_tags(&output.text);
    info!("Photo {} tagged: {:?}", photo.id(), tags);
    Ok(tags)
}
