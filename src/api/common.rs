//! Common API utilities and shared types
//!
//! Query-string validation, path id decoding and multipart form parsing
//! used by every resource module.

use axum::extract::Multipart;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::api::middleware::ApiError;
use crate::db::{ListQuery, QueryConfig};
use crate::ids::IdCodec;
use crate::services::{ServiceError, UploadedFile};

/// Validate a listing request
pub fn list_query(
    params: &HashMap<String, String>,
    config: &'static QueryConfig,
    codec: &IdCodec,
) -> Result<ListQuery, ApiError> {
    ListQuery::parse(params, config, codec).map_err(|e| ServiceError::from(e).into())
}

/// Like [`list_query`], but a non-empty `query` parameter is mandatory
pub fn search_query(
    params: &HashMap<String, String>,
    config: &'static QueryConfig,
    codec: &IdCodec,
) -> Result<ListQuery, ApiError> {
    let query = list_query(params, config, codec)?;
    if query.search().is_none() {
        return Err(ApiError::validation_error("query parameter is required"));
    }
    Ok(query)
}

/// Decode an id taken from the URL path; undecodable ids are 404
pub fn path_id(codec: &IdCodec, token: &str) -> Result<i64, ApiError> {
    codec
        .decode(token)
        .map_err(|e| ServiceError::from(e).into())
}

/// Body of the bulk endpoints
#[derive(Debug, Deserialize)]
pub struct BulkIdsRequest {
    pub ids: Vec<String>,
}

/// A multipart form split into text fields and files
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Read every part. Parts with a file name are files; the rest are text.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation_error(format!("Malformed multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(original_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            original_name,
                            content_type,
                            data: data.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation_error(format!("Failed to read field '{}': {}", name, e)))?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn required(&self, name: &str) -> Result<String, ApiError> {
        self.text(name)
            .ok_or_else(|| ApiError::validation_error(format!("{} is required", name)))
    }

    /// Parse a field with `FromStr`; blank values count as absent
    pub fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.fields.get(name).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::validation_error(format!("{} has an invalid value", name))),
        }
    }

    /// `"true"` / `"false"`, blank or missing is `None`
    pub fn flag(&self, name: &str) -> Result<Option<bool>, ApiError> {
        match self.fields.get(name).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some("true") => Ok(Some(true)),
            Some("false") => Ok(Some(false)),
            Some(_) => Err(ApiError::validation_error(format!(
                "{} must be 'true' or 'false'",
                name
            ))),
        }
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::tests::codec;
    use crate::db::repositories::CONTACT_QUERY;
    use axum::http::StatusCode;

    fn form(pairs: &[(&str, &str)]) -> MultipartForm {
        MultipartForm {
            fields: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            files: HashMap::new(),
        }
    }

    #[test]
    fn test_field_helpers() {
        let form = form(&[("is_public", "true"), ("rating", " 4 "), ("blank", ""), ("flag", "yes")]);
        assert_eq!(form.flag("is_public").unwrap(), Some(true));
        assert_eq!(form.flag("missing").unwrap(), None);
        assert!(form.flag("flag").is_err());
        assert_eq!(form.parsed::<i64>("rating").unwrap(), Some(4));
        assert_eq!(form.parsed::<i64>("blank").unwrap(), None);
        assert!(form.parsed::<i64>("flag").is_err());
        assert!(form.required("missing").is_err());
    }

    #[test]
    fn test_search_requires_query() {
        let codec = codec();
        let mut params = HashMap::new();
        assert_eq!(
            search_query(&params, &CONTACT_QUERY, &codec).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
        params.insert("query".to_string(), "admissions".to_string());
        assert!(search_query(&params, &CONTACT_QUERY, &codec).is_ok());
    }

    #[test]
    fn test_bad_path_id_is_not_found() {
        let codec = codec();
        assert_eq!(path_id(&codec, "123").unwrap_err().status, StatusCode::NOT_FOUND);
        assert_eq!(path_id(&codec, &codec.encode(9)).unwrap(), 9);
    }
}
