//! Filesystem storage for uploaded artifacts
//!
//! Artifacts live at `<root>/<credential>/day-<N>/<filename>`. Uploads are
//! first written to `<root>/.staging/` and only moved into place while the
//! submission row's transaction is still open, so a failed write never
//! leaves a row pointing at a missing file.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::study::StudyDay;

const STAGING_DIR: &str = ".staging";
const DEFAULT_FILENAME: &str = "artifact";

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Artifact directory manager
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root_dir: PathBuf,
}

impl ArtifactStore {
    /// Create the store, making sure the root and staging directories exist
    pub async fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self, StoreError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(root_dir.join(STAGING_DIR)).await?;

        info!(path = %root_dir.display(), "Initialized artifact store");

        Ok(Self { root_dir })
    }

    /// Reference persisted alongside the submission row
    pub fn reference_for(credential: &str, day: StudyDay, file_name: Option<&str>) -> String {
        format!(
            "{}/day-{}/{}",
            credential,
            day,
            sanitize_filename(file_name.unwrap_or(DEFAULT_FILENAME))
        )
    }

    /// Absolute path for a stored reference
    pub fn resolve(&self, reference: &str) -> PathBuf {
        self.root_dir.join(reference)
    }

    /// Write the upload to the staging area
    pub async fn stage(
        &self,
        credential: &str,
        day: StudyDay,
        upload: &ArtifactUpload,
    ) -> Result<StagedArtifact, StoreError> {
        let reference = Self::reference_for(credential, day, upload.file_name.as_deref());
        let staged_path = self
            .root_dir
            .join(STAGING_DIR)
            .join(uuid::Uuid::new_v4().to_string());

        fs::write(&staged_path, &upload.bytes).await?;
        debug!(staged = %staged_path.display(), size = upload.bytes.len(), "Staged artifact");

        Ok(StagedArtifact {
            final_path: self.resolve(&reference),
            staged_path,
            reference,
            promoted: false,
        })
    }

    /// Delete a stored artifact
    pub fn remove(&self, reference: &str) -> Result<(), StoreError> {
        std::fs::remove_file(self.resolve(reference))?;
        Ok(())
    }
}

/// A staged upload waiting to be moved into its final location. Dropping it
/// unpromoted deletes the staged file.
#[derive(Debug)]
pub struct StagedArtifact {
    staged_path: PathBuf,
    final_path: PathBuf,
    reference: String,
    promoted: bool,
}

impl StagedArtifact {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn is_promoted(&self) -> bool {
        self.promoted
    }

    /// Move the staged file to its final path (same filesystem, so a rename)
    pub fn promote(&mut self) -> Result<(), StoreError> {
        if let Some(parent) = self.final_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&self.staged_path, &self.final_path)?;
        self.promoted = true;
        info!(artifact = %self.reference, "Stored artifact");
        Ok(())
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if !self.promoted {
            if let Err(e) = std::fs::remove_file(&self.staged_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.staged_path.display(), error = %e, "Failed to discard staged artifact");
                }
            }
        }
    }
}

/// Reduce an uploaded filename to a safe basename
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned
    }
}
