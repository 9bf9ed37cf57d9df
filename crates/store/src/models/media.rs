use exn::ResultExt;
use time::UtcDateTime;

use crate::error::{Error, ErrorKind};

/// A media record tracked by the dedup engine.
///
/// One row per upstream media id. `content_hash` is the selective container
/// digest for video/audio and the perceptual fingerprint for images; it is
/// `None` until the file has been hashed at least once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub id: i64,
    pub account_id: i64,
    pub mimetype: String,
    pub content_hash: Option<String>,
    pub local_filename: Option<String>,
    pub is_downloaded: bool,
    /// Canonical creation time from upstream metadata, when known.
    pub created_at: Option<UtcDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MediaRow {
    pub id: i64,
    pub account_id: i64,
    pub mimetype: String,
    pub content_hash: Option<String>,
    pub local_filename: Option<String>,
    pub is_downloaded: i64,
    pub created_at: Option<i64>,
}

impl TryFrom<MediaRow> for Media {
    type Error = Error;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        let created_at = row
            .created_at
            .map(UtcDateTime::from_unix_timestamp)
            .transpose()
            .or_raise(|| ErrorKind::InvalidData("creation date"))?;
        Ok(Self {
            id: row.id,
            account_id: row.account_id,
            mimetype: row.mimetype,
            content_hash: row.content_hash,
            local_filename: row.local_filename,
            is_downloaded: row.is_downloaded != 0,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_converts_to_model() {
        let row = MediaRow {
            id: 42,
            account_id: 7,
            mimetype: "video/mp4".to_string(),
            content_hash: Some("deadbeef".to_string()),
            local_filename: Some("clip_id_42.mp4".to_string()),
            is_downloaded: 1,
            created_at: Some(1_681_555_500),
        };
        let media = Media::try_from(row).unwrap();
        assert!(media.is_downloaded);
        assert_eq!(media.created_at.unwrap().year(), 2023);
    }

    #[test]
    fn test_out_of_range_creation_date_is_rejected() {
        let row = MediaRow {
            id: 1,
            account_id: 1,
            mimetype: String::new(),
            content_hash: None,
            local_filename: None,
            is_downloaded: 0,
            created_at: Some(i64::MAX),
        };
        let err = Media::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData(_)));
    }
}
