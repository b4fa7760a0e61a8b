//! JSON output types for the tsfamix binary.
//!
//! Every run prints exactly one response object to stdout: an
//! [`IndexResponse`] on success, an [`ErrorResponse`] on failure. Logs go to
//! stderr.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use tsfamix_core::repository::ModelRepository;
use tsfamix_index::{IndexReport, UpdateReport};

use crate::error::FamixError;

/// Version of the response schema.
pub const SCHEMA_VERSION: &str = "1";

/// Summary of an indexing run.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    pub status: String,
    pub schema_version: String,
    /// Files traversed by the full run.
    pub files: usize,
    /// Entities in the repository at the end.
    pub entities: usize,
    /// Entity count per kind, keyed by kind name.
    pub counts: BTreeMap<String, usize>,
    /// Per-node errors of the full run.
    pub errors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateSummary>,
}

impl IndexResponse {
    pub fn new(report: &IndexReport, repo: &ModelRepository) -> Self {
        IndexResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            files: report.files,
            entities: repo.len(),
            counts: kind_counts(repo),
            errors: report.errors.len(),
            update: None,
        }
    }

    /// Attach the outcome of an applied change set; totals are refreshed.
    pub fn with_update(mut self, update: &UpdateReport, repo: &ModelRepository) -> Self {
        self.entities = repo.len();
        self.counts = kind_counts(repo);
        self.update = Some(UpdateSummary::from(update));
        self
    }
}

/// Summary of an applied change set.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub removed: usize,
    pub dependents: usize,
    pub retraversed: Vec<String>,
    pub resolved: usize,
    pub created: usize,
    pub errors: usize,
}

impl From<&UpdateReport> for UpdateSummary {
    fn from(report: &UpdateReport) -> Self {
        UpdateSummary {
            removed: report.removed,
            dependents: report.dependents,
            retraversed: report.retraversed.clone(),
            resolved: report.resolved,
            created: report.created,
            errors: report.errors.len(),
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn new(err: &FamixError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(err: &FamixError) -> Self {
        ErrorInfo {
            code: err.error_code().code(),
            message: err.to_string(),
        }
    }
}

fn kind_counts(repo: &ModelRepository) -> BTreeMap<String, usize> {
    repo.counts()
        .into_iter()
        .map(|(kind, count)| (kind.as_str().to_string(), count))
        .collect()
}

/// Emit a response as pretty-printed JSON.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_carries_code() {
        let err = FamixError::file_not_found("dump.json");
        let mut out = Vec::new();
        emit_response(&ErrorResponse::new(&err), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], 3);
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
    }

    #[test]
    fn update_is_omitted_without_changes() {
        let repo = ModelRepository::new();
        let response = IndexResponse::new(&IndexReport::default(), &repo);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("update"));
        assert!(json.contains("\"status\":\"ok\""));
    }
}
