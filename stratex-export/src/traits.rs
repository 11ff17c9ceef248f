//! Collaborator seams for the coordinator.

use async_trait::async_trait;
use stratex_core::ExportError;

use crate::types::{ExportArtifact, ExportInput, SchemaDescriptor, ValidationVerdict};

/// Checks a schema before any export runs against it.
///
/// A rejection is a normal verdict, not an error.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(&self, schema: &SchemaDescriptor) -> ValidationVerdict;
}

/// The underlying export routine.
///
/// May be slow. The coordinator calls it without holding any cache lock and
/// never caches a failed result.
#[async_trait]
pub trait ArtifactExporter: Send + Sync {
    async fn export_artifact(
        &self,
        input: &ExportInput,
        schema: &SchemaDescriptor,
    ) -> Result<ExportArtifact, ExportError>;
}
