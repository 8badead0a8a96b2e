//! Installation verification
//!
//! Checks that the packaged artifacts of the application under test exist
//! on disk. Nothing here is launched or opened.

use std::path::PathBuf;

use serde::Serialize;

use crate::common::config::ArtifactConfig;

/// Result of checking one artifact
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub name: String,
    pub path: PathBuf,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Check every artifact, in order
pub fn verify_artifacts(artifacts: &[ArtifactConfig]) -> Vec<VerifyResult> {
    artifacts
        .iter()
        .map(|artifact| {
            let found = artifact.path.exists();
            tracing::debug!(name = %artifact.name, path = %artifact.path.display(), found, "Artifact checked");
            VerifyResult {
                name: artifact.name.clone(),
                path: artifact.path.clone(),
                found,
                note: artifact.note.clone(),
            }
        })
        .collect()
}
