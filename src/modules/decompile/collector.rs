use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::errors::CollectionError;

use super::model::{ArtifactKind, CollectedFile, DecompiledArtifact};

/// Walks an output directory and folds its files into a [`DecompiledArtifact`].
///
/// Entries are visited depth-first, sorted by file name within each directory.
/// When several files feed the same slot the last one visited wins; every
/// classified file is still listed in [`DecompiledArtifact::files`].
/// Any walk, read or parse error aborts the whole collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactCollector;

impl ArtifactCollector {
    pub fn collect(&self, dir: &Path) -> Result<DecompiledArtifact, CollectionError> {
        let mut artifact = DecompiledArtifact::default();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|source| CollectionError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(kind) = ArtifactKind::classify(path) else {
                continue;
            };

            let contents =
                std::fs::read_to_string(path).map_err(|source| CollectionError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

            if kind.is_source() {
                artifact.source = Some(contents);
            } else {
                let value = serde_json::from_str(&contents).map_err(|source| {
                    CollectionError::Parse {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                artifact.interface = Some(value);
            }

            let relative_path = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
            debug!(file = %relative_path.display(), ?kind, "collected artifact file");
            artifact.files.push(CollectedFile {
                relative_path,
                kind,
            });
        }

        Ok(artifact)
    }
}
