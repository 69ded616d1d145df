//! Media classification and the descriptor returned by ingestion.

use crate::identity::{TenantId, UserId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Kind of media inferred from a content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Infer the media kind from a MIME content type.
    ///
    /// Only a `video/` prefix (case-insensitive) selects [`MediaKind::Video`];
    /// every other content type is held to the image ceiling.
    pub fn from_content_type(content_type: &str) -> Self {
        let prefix = content_type.trim_start().get(..6);
        match prefix {
            Some(p) if p.eq_ignore_ascii_case("video/") => Self::Video,
            _ => Self::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// Descriptor of a media asset persisted by the ingestion collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Identifier assigned by the media store.
    pub media_id: Uuid,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// User who uploaded the file.
    pub uploader_id: UserId,
    /// Original file name.
    pub file_name: String,
    /// MIME content type.
    pub content_type: String,
    /// Size of the persisted asset in bytes.
    pub size_bytes: u64,
    /// Where the asset can be fetched from, if the store exposes one.
    pub location: Option<String>,
    /// When the asset was persisted.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
