//! Export data types exchanged with callers and collaborators.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stratex_cache::CacheStats;
use stratex_core::{CacheType, Digest, DigestBuilder, ExportError, Timestamp};
use stratex_monitor::PerformanceSummary;
use thiserror::Error;

// ============================================================================
// SCHEMA
// ============================================================================

/// One column of an export schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub data_type: String,
    pub required: bool,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            required,
        }
    }
}

/// Description of the schema an export must conform to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub name: String,
    pub version: String,
    pub fields: Vec<SchemaField>,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    /// Schema cache key.
    ///
    /// Every field is hashed as its own length-prefixed part in declaration
    /// order, so reordering columns yields a different digest.
    pub fn digest(&self) -> Digest {
        let mut builder = DigestBuilder::new()
            .part(&self.name)
            .part(&self.version)
            .part((self.fields.len() as u64).to_le_bytes());
        for field in &self.fields {
            builder = builder
                .part(&field.name)
                .part(&field.data_type)
                .part([u8::from(field.required)]);
        }
        builder.finish()
    }
}

/// Outcome of validating a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub reasons: Vec<String>,
}

impl ValidationVerdict {
    pub fn accepted() -> Self {
        Self {
            valid: true,
            reasons: Vec::new(),
        }
    }

    pub fn rejected(reasons: Vec<String>) -> Self {
        Self {
            valid: false,
            reasons,
        }
    }
}

// ============================================================================
// EXPORT INPUT / ARTIFACT
// ============================================================================

/// Data to export plus the resolved export options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInput {
    pub payload: Vec<u8>,
    /// Resolved export configuration (format, delimiter, columns, ...).
    #[serde(default)]
    pub options: serde_json::Value,
}

impl ExportInput {
    pub fn new(payload: impl Into<Vec<u8>>, options: serde_json::Value) -> Self {
        Self {
            payload: payload.into(),
            options,
        }
    }

    /// Result cache key for this input under the schema with `schema_digest`.
    ///
    /// Options are hashed in their compact JSON rendering. Object keys render
    /// sorted, so key order in the caller's options does not matter.
    pub fn content_digest(&self, schema_digest: &Digest) -> Digest {
        DigestBuilder::new()
            .part(&self.payload)
            .part(self.options.to_string())
            .digest(schema_digest)
            .finish()
    }
}

/// Output of the export routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub row_count: u64,
    pub created_at: Timestamp,
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Why an export produced no artifact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExportFailure {
    #[error("Schema rejected: {}", reasons.join("; "))]
    SchemaRejected { reasons: Vec<String> },

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Result of one `export_with_cache` call.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub result: Result<Arc<ExportArtifact>, ExportFailure>,
    /// True when the artifact came from the result cache.
    pub cache_hit: bool,
    /// Which cache produced the result: `Export` on a result cache hit,
    /// otherwise `None`.
    pub cache_type: CacheType,
    /// True when the validation verdict came from the schema cache.
    pub schema_cache_hit: bool,
    pub schema_digest: Digest,
    /// Absent when the schema was rejected.
    pub content_digest: Option<Digest>,
    pub elapsed: Duration,
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn artifact(&self) -> Option<&Arc<ExportArtifact>> {
        self.result.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&ExportFailure> {
        self.result.as_ref().err()
    }
}

/// Per-cache statistics plus the monitor summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportCacheDiagnostics {
    pub schema_cache: CacheStats,
    pub export_cache: CacheStats,
    pub performance: PerformanceSummary,
}
