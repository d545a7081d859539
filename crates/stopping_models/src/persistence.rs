//! Versioned JSON model artifacts.
//!
//! An artifact stores the model kind, a format version, the seed, the
//! architecture and the full network (weights and non-trainable statistics).
//! Optimiser state is not stored: a loaded model is uncompiled and
//! inference-only until compiled again.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ModelError;
use crate::network::Network;

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 1;

/// Serialised model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelArtifact<A> {
    /// Artifact format version
    pub format_version: u32,
    /// Model kind tag
    pub kind: String,
    /// Seed the model was created with
    pub seed: u64,
    /// Architecture description
    pub architecture: A,
    /// Layers and weights
    pub network: Network,
}

impl<A> ModelArtifact<A> {
    /// Creates an artifact at the current format version.
    pub fn new(kind: &str, seed: u64, architecture: A, network: Network) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            kind: kind.to_string(),
            seed,
            architecture,
            network,
        }
    }
}

/// Writes an artifact as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ModelError::Serialisation`] or [`ModelError::Io`].
pub fn save_artifact<A: Serialize>(path: &Path, artifact: &ModelArtifact<A>) -> Result<(), ModelError> {
    let json = serde_json::to_string_pretty(artifact)?;
    fs::write(path, json).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), kind = %artifact.kind, "Saved model artifact");
    Ok(())
}

/// Reads an artifact, checking kind and format version before decoding the
/// body.
///
/// # Errors
///
/// Returns [`ModelError::UnsupportedArtifact`] for a wrong kind or version,
/// and [`ModelError::Io`] / [`ModelError::Serialisation`] otherwise.
pub fn load_artifact<A: DeserializeOwned>(
    path: &Path,
    expected_kind: &str,
) -> Result<ModelArtifact<A>, ModelError> {
    let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let version = value.get("format_version").and_then(serde_json::Value::as_u64);
    if version != Some(u64::from(FORMAT_VERSION)) {
        return Err(ModelError::UnsupportedArtifact(format!(
            "format version {version:?}, expected {FORMAT_VERSION}"
        )));
    }
    let kind = value.get("kind").and_then(serde_json::Value::as_str);
    if kind != Some(expected_kind) {
        return Err(ModelError::UnsupportedArtifact(format!(
            "kind {kind:?}, expected {expected_kind:?}"
        )));
    }
    let artifact: ModelArtifact<A> = serde_json::from_value(value)?;
    info!(path = %path.display(), kind = expected_kind, "Loaded model artifact");
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_round_trip_and_kind_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let artifact = ModelArtifact::new("probe", 5, 42usize, Network::new(3));
        save_artifact(&path, &artifact).unwrap();

        let loaded: ModelArtifact<usize> = load_artifact(&path, "probe").unwrap();
        assert_eq!(loaded.architecture, 42);
        assert_eq!(loaded.seed, 5);
        assert_eq!(loaded.network.input_width(), 3);

        let wrong = load_artifact::<usize>(&path, "other");
        assert!(matches!(wrong, Err(ModelError::UnsupportedArtifact(_))));
    }

    #[test]
    fn test_rejects_future_version() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"format_version": 99, "kind": "probe"}}"#).unwrap();
        let err = load_artifact::<usize>(file.path(), "probe").unwrap_err();
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_artifact::<usize>(Path::new("/nonexistent/model.json"), "probe").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
