//! Load-once model cache.
//!
//! A [`ModelCache`] reads its artifact at most once and hands out the same
//! `Arc<Model>` on every later call. A failed load leaves the cache empty, so
//! replacing the artifact and calling [`ModelCache::load`] again retries.
//!
//! The process-wide cache used by the CLI is [`shared_cache`]; tests build
//! independent caches with [`ModelCache::new`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;

use super::Model;
use crate::features::N_FEATURES;
use crate::io::{Artifact, DeserializeError, NativeCodec};

/// Errors that make a model artifact unusable.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model artifact {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: DeserializeError,
    },

    #[error("model expects {actual} features, the screening interface provides {expected}")]
    InterfaceMismatch { expected: usize, actual: usize },
}

/// Read and decode an artifact from disk.
pub fn load_artifact(path: &Path) -> Result<Artifact, ModelLoadError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ModelLoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ModelLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    NativeCodec::new()
        .deserialize(&bytes)
        .map_err(|source| ModelLoadError::Format {
            path: path.to_path_buf(),
            source,
        })
}

/// Guarded lazy holder for one model artifact.
#[derive(Debug)]
pub struct ModelCache {
    path: PathBuf,
    expected_features: usize,
    cell: OnceCell<Arc<Model>>,
}

impl ModelCache {
    /// A cache for the artifact at `path`, expecting the nine-feature interface.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            expected_features: N_FEATURES,
            cell: OnceCell::new(),
        }
    }

    /// A cache that is already populated with `model`.
    pub fn with_model(path: impl Into<PathBuf>, model: Model) -> Self {
        let cache = Self::new(path);
        let _ = cache.cell.set(Arc::new(model));
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Load the model, reading the artifact only on the first successful call.
    pub fn load(&self) -> Result<Arc<Model>, ModelLoadError> {
        self.cell
            .get_or_try_init(|| self.read_model().map(Arc::new))
            .map(Arc::clone)
    }

    fn read_model(&self) -> Result<Model, ModelLoadError> {
        let start = Instant::now();
        let artifact = load_artifact(&self.path)?;
        let actual = artifact.model.n_features();
        if actual != self.expected_features {
            return Err(ModelLoadError::InterfaceMismatch {
                expected: self.expected_features,
                actual,
            });
        }

        let model = artifact.model;
        let n_trees = match model.classifier().booster() {
            super::Booster::Forest(forest) => forest.n_trees(),
            super::Booster::Linear(_) => 0,
        };
        log::info!(
            "loaded {} model from {} ({}, {} trees, objective {}) in {:?}",
            model.kind(),
            self.path.display(),
            model.classifier().booster().kind(),
            n_trees,
            model.classifier().objective().unwrap_or("unknown"),
            start.elapsed()
        );
        Ok(model)
    }
}

static SHARED: OnceCell<ModelCache> = OnceCell::new();

/// The process-wide model cache.
///
/// The first call fixes the artifact path; later calls return the same cache.
pub fn shared_cache(path: impl Into<PathBuf>) -> &'static ModelCache {
    let path = path.into();
    let cache = SHARED.get_or_init(|| ModelCache::new(path.clone()));
    if cache.path() != path.as_path() {
        log::warn!(
            "shared model cache already bound to {}, ignoring {}",
            cache.path().display(),
            path.display()
        );
    }
    cache
}
