//! The storage-URI scheme (§6), grounded in `infra/storage.py`'s
//! `parse_storage_uri`.
//!
//! Every evidence file and derived artifact persists its byte location as
//! one of these URIs rather than a bare key, so a row is self-describing
//! about which backend wrote it even if `STORAGE_MODE` changes later.

use ricc_core::CoreError;

/// A parsed storage URI: which backend wrote the bytes, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    S3 { bucket: Option<String>, key: String },
    File { path: String },
}

/// Parses a `s3://bucket/key` or `file:///abs/path` URI.
///
/// `s3://` URIs resolve against the store's own configured bucket at
/// write time (the bucket segment is informational only — see
/// `infra/storage.py`'s own `parse_storage_uri`, which discards it too);
/// it is retained here for diagnostics.
pub fn parse_storage_uri(uri: &str) -> Result<StorageLocation, CoreError> {
    if let Some(rest) = uri.strip_prefix("s3://") {
        let mut parts = rest.splitn(2, '/');
        let bucket = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let key = parts.next().unwrap_or("").to_string();
        return Ok(StorageLocation::S3 { bucket, key });
    }
    if let Some(rest) = uri.strip_prefix("file://") {
        return Ok(StorageLocation::File { path: rest.to_string() });
    }
    Err(CoreError::StorageWriteFailed {
        key: uri.to_string(),
        reason: format!("unsupported storage_uri scheme: {uri}"),
    })
}

pub fn format_file_uri(path: &str) -> String {
    format!("file://{path}")
}

pub fn format_s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_s3_uri() {
        let loc = parse_storage_uri("s3://epic1/evidence/doc/ver/file.pdf").unwrap();
        assert_eq!(
            loc,
            StorageLocation::S3 { bucket: Some("epic1".to_string()), key: "evidence/doc/ver/file.pdf".to_string() }
        );
    }

    #[test]
    fn parses_file_uri() {
        let loc = parse_storage_uri("file:///data/storage/evidence/a.pdf").unwrap();
        assert_eq!(loc, StorageLocation::File { path: "/data/storage/evidence/a.pdf".to_string() });
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(parse_storage_uri("ftp://host/path").is_err());
    }

    #[test]
    fn round_trips_file_uri() {
        let uri = format_file_uri("/tmp/x/y.json");
        let loc = parse_storage_uri(&uri).unwrap();
        assert_eq!(loc, StorageLocation::File { path: "/tmp/x/y.json".to_string() });
    }

    #[test]
    fn round_trips_s3_uri() {
        let uri = format_s3_uri("epic1", "canonical/v1/stable_text.txt");
        let loc = parse_storage_uri(&uri).unwrap();
        assert_eq!(
            loc,
            StorageLocation::S3 { bucket: Some("epic1".to_string()), key: "canonical/v1/stable_text.txt".to_string() }
        );
    }
}
