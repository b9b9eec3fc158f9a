//! Per-item bookkeeping for bulk operations
//!
//! Bulk endpoints accept encoded ids. Ids that cannot be decoded, do not
//! exist, or fail a capability check are reported individually; the rest
//! are applied together.

use serde::Serialize;

use crate::ids::IdCodec;
use crate::services::ServiceError;

/// Largest number of ids accepted by one bulk request
pub const MAX_BULK_IDS: usize = 100;

/// Why one id of a bulk request was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemError {
    /// The id exactly as the client sent it
    pub id: String,
    pub error: String,
}

impl BulkItemError {
    pub fn new(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkDeleteResult {
    pub deleted_count: u64,
    pub errors: Vec<BulkItemError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkUpdateResult {
    pub updated_count: u64,
    pub errors: Vec<BulkItemError>,
}

/// Reject empty and oversized batches
pub fn check_batch(tokens: &[String]) -> Result<(), ServiceError> {
    if tokens.is_empty() {
        return Err(ServiceError::validation("ids must not be empty"));
    }
    if tokens.len() > MAX_BULK_IDS {
        return Err(ServiceError::Validation(format!(
            "At most {} ids may be processed at once",
            MAX_BULK_IDS
        )));
    }
    Ok(())
}

/// Decode every token, splitting them into `(token, id)` pairs and errors.
/// Repeated ids are kept once.
pub fn decode_ids(codec: &IdCodec, tokens: &[String]) -> (Vec<(String, i64)>, Vec<BulkItemError>) {
    let mut decoded: Vec<(String, i64)> = Vec::with_capacity(tokens.len());
    let mut errors = Vec::new();
    for token in tokens {
        match codec.decode(token) {
            Ok(id) if decoded.iter().any(|(_, seen)| *seen == id) => {}
            Ok(id) => decoded.push((token.clone(), id)),
            Err(_) => errors.push(BulkItemError::new(token.as_str(), "Resource not found")),
        }
    }
    (decoded, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::tests::codec;

    #[test]
    fn test_decode_ids_reports_bad_tokens() {
        let codec = codec();
        let tokens = vec![
            codec.encode(1),
            "garbage".to_string(),
            codec.encode(2),
            codec.encode(1),
        ];
        let (ids, errors) = decode_ids(&codec, &tokens);
        assert_eq!(ids.iter().map(|(_, id)| *id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(errors, vec![BulkItemError::new("garbage", "Resource not found")]);
    }

    #[test]
    fn test_check_batch_bounds() {
        assert!(check_batch(&[]).is_err());
        assert!(check_batch(&["a".to_string()]).is_ok());
        assert!(check_batch(&vec!["a".to_string(); MAX_BULK_IDS + 1]).is_err());
    }
}
