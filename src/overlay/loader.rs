//! Model loader with fallback chain
//!
//! For each variant the loader walks its source candidates in order (direct
//! URLs first, then CORS proxies). The first source that fetches and parses
//! wins. If every source fails, a placeholder model is synthesized so the
//! overlay always has something to show.
//!
//! Per-variant state machine:
//!
//! ```text
//! NotLoaded -> Loading { attempt } -> Loaded
//!                   |
//!                   +-> Failed -> FallbackLoaded
//! ```
//!
//! `Loaded` and `FallbackLoaded` are terminal; later loads of the same
//! variant reuse the cached asset until [`ModelLoader::invalidate`].

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::overlay::catalog::{is_remote, SourceCandidate, Variant};
use crate::overlay::model::ModelAsset;
use crate::overlay::placeholder::placeholder_model;

/// Load state of one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    NotLoaded,
    Loading { attempt: usize },
    Loaded,
    Failed,
    FallbackLoaded,
}

impl Default for LoadState {
    fn default() -> Self {
        Self::NotLoaded
    }
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::FallbackLoaded)
    }
}

/// Per-variant load states, readable while a load is in progress
pub type LoadStates = Arc<RwLock<HashMap<String, LoadState>>>;

/// Fetches raw model bytes
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, LoaderError>> + Send;
}

/// Fetches `http(s)` URLs over the network and everything else from disk
pub struct ModelFetcher {
    client: reqwest::Client,
    base_dir: PathBuf,
}

impl ModelFetcher {
    pub fn new(config: &LoaderConfig) -> Result<Self, LoaderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder.build().map_err(|e| LoaderError::Fetch {
            url: String::new(),
            message: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            base_dir: config.models_dir.clone(),
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, LoaderError> {
        let fetch_err = |e: reqwest::Error| LoaderError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(fetch_err)?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(LoaderError::Http {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(fetch_err)?;
        Ok(bytes.to_vec())
    }

    async fn fetch_local(&self, url: &str) -> Result<Vec<u8>, LoaderError> {
        let path = self.base_dir.join(url.trim_start_matches('/'));
        tokio::fs::read(&path).await.map_err(|e| LoaderError::Fetch {
            url: url.to_string(),
            message: format!("{}: {}", path.display(), e),
        })
    }
}

impl AssetFetcher for ModelFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoaderError> {
        if is_remote(url) {
            self.fetch_remote(url).await
        } else {
            self.fetch_local(url).await
        }
    }
}

/// Result of [`ModelLoader::load`]
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub asset: Arc<ModelAsset>,
    pub state: LoadState,
    /// Fetch attempts made by this call (0 when served from cache)
    pub attempts: usize,
    pub cached: bool,
    /// One error per failed source, in order
    pub errors: Vec<LoaderError>,
}

impl LoadOutcome {
    pub fn is_fallback(&self) -> bool {
        self.state == LoadState::FallbackLoaded
    }
}

pub struct ModelLoader<F> {
    fetcher: F,
    config: LoaderConfig,
    cache: HashMap<String, Arc<ModelAsset>>,
    states: LoadStates,
}

impl<F: AssetFetcher> ModelLoader<F> {
    pub fn new(fetcher: F, config: &LoaderConfig) -> Self {
        Self {
            fetcher,
            config: config.clone(),
            cache: HashMap::new(),
            states: LoadStates::default(),
        }
    }

    pub async fn state(&self, variant_id: &str) -> LoadState {
        self.states.read().await.get(variant_id).copied().unwrap_or_default()
    }

    /// Shared handle to the load states; reading it never waits on a fetch
    pub fn load_states(&self) -> LoadStates {
        Arc::clone(&self.states)
    }

    pub fn cached(&self, variant_id: &str) -> Option<Arc<ModelAsset>> {
        self.cache.get(variant_id).cloned()
    }

    /// Drop the cached asset so the next load goes back to the network
    pub async fn invalidate(&mut self, variant_id: &str) {
        self.cache.remove(variant_id);
        self.states.write().await.remove(variant_id);
    }

    async fn set_state(&self, variant_id: &str, state: LoadState) {
        tracing::debug!("Model '{}' -> {:?}", variant_id, state);
        self.states.write().await.insert(variant_id.to_string(), state);
    }

    /// Candidate sources for a variant, in the order they will be tried
    pub fn sources(&self, variant: &Variant) -> Vec<SourceCandidate> {
        variant.sources(&self.config)
    }

    /// Load a variant, falling back to the placeholder when every source fails
    pub async fn load(&mut self, variant: &Variant) -> Result<LoadOutcome, LoaderError> {
        if let Some(asset) = self.cached(&variant.id) {
            return Ok(LoadOutcome {
                asset,
                state: self.state(&variant.id).await,
                attempts: 0,
                cached: true,
                errors: Vec::new(),
            });
        }

        let sources = self.sources(variant);
        let mut errors = Vec::new();

        for (i, source) in sources.iter().enumerate() {
            self.set_state(&variant.id, LoadState::Loading { attempt: i + 1 }).await;
            let url = source.request_url();

            let result = match self.fetcher.fetch(&url).await {
                Ok(bytes) => ModelAsset::from_gltf_slice(&url, &bytes, variant.scale),
                Err(e) => Err(e),
            };

            match result {
                Ok(asset) => {
                    tracing::info!(
                        "Loaded model '{}' from {} ({} vertices)",
                        variant.id,
                        url,
                        asset.vertex_count()
                    );
                    let asset = Arc::new(asset);
                    self.cache.insert(variant.id.clone(), asset.clone());
                    self.set_state(&variant.id, LoadState::Loaded).await;

                    return Ok(LoadOutcome {
                        asset,
                        state: LoadState::Loaded,
                        attempts: i + 1,
                        cached: false,
                        errors,
                    });
                }
                Err(e) => {
                    tracing::warn!("Model source {} for '{}' failed: {}", i + 1, variant.id, e);
                    errors.push(e);
                }
            }
        }

        self.set_state(&variant.id, LoadState::Failed).await;
        tracing::warn!(
            "All {} sources failed for '{}', using placeholder",
            sources.len(),
            variant.id
        );

        let asset = Arc::new(placeholder_model(&variant.color, variant.scale)?);
        self.cache.insert(variant.id.clone(), asset.clone());
        self.set_state(&variant.id, LoadState::FallbackLoaded).await;

        Ok(LoadOutcome {
            asset,
            state: LoadState::FallbackLoaded,
            attempts: sources.len(),
            cached: false,
            errors,
        })
    }
}
