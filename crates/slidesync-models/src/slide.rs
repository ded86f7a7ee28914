//! Reference slides rasterized from the two source documents.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image::ImageData;

/// Which of the two ordered reference documents a slide comes from.
///
/// Source 1 content always precedes source 2 content in the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SourceId {
    /// The document presented first (source 1)
    First,
    /// The document presented second (source 2)
    Second,
}

impl SourceId {
    pub const ALL: [SourceId; 2] = [SourceId::First, SourceId::Second];

    pub fn as_u8(self) -> u8 {
        match self {
            SourceId::First => 1,
            SourceId::Second => 2,
        }
    }
}

impl From<SourceId> for u8 {
    fn from(id: SourceId) -> Self {
        id.as_u8()
    }
}

impl TryFrom<u8> for SourceId {
    type Error = SourceIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SourceId::First),
            2 => Ok(SourceId::Second),
            other => Err(SourceIdError(other.into())),
        }
    }
}

impl TryFrom<u32> for SourceId {
    type Error = SourceIdError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| SourceIdError(value))
            .and_then(SourceId::try_from)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl JsonSchema for SourceId {
    fn schema_name() -> String {
        "SourceId".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <u8 as JsonSchema>::json_schema(gen)
    }
}

/// Source id outside {1, 2}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid source id {0}: expected 1 or 2")]
pub struct SourceIdError(pub u32);

/// One rasterized page of a reference document. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSlide {
    pub source_id: SourceId,
    /// 1-based page number, ascending and unique per source
    pub page_number: u32,
    pub image: ImageData,
}

impl ReferenceSlide {
    pub fn new(source_id: SourceId, page_number: u32, image: ImageData) -> Self {
        Self {
            source_id,
            page_number,
            image,
        }
    }

    /// Human-readable label used in requests and result tables.
    pub fn label(&self) -> String {
        format!("Source {} - Page {}", self.source_id, self.page_number)
    }
}
