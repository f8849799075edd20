//! Stimulus catalog and image sources.

use crate::catalog::TrialCatalog;
use crate::error::{AssetError, AssetLoadError, CatalogError};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub image: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<TrialCatalog, CatalogError>;
    async fn preload(&self, image: &str) -> Result<AssetInfo, AssetError>;
}

/// Preloads every reference concurrently and waits for all of them to
/// settle. Any failure fails the whole load, naming each failed reference.
pub async fn preload_all(
    source: &dyn AssetSource,
    images: &[String],
) -> Result<Vec<AssetInfo>, AssetLoadError> {
    let total = images.len();
    let loaded = AtomicUsize::new(0);
    info!("preloading {total} images");

    let results = join_all(images.iter().map(|image| {
        let loaded = &loaded;
        async move {
            let result = source.preload(image).await;
            let n = loaded.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("loaded {n}/{total}: {image}");
            result
        }
    }))
    .await;

    let mut infos = Vec::with_capacity(total);
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(info) => infos.push(info),
            Err(e) => {
                warn!("{e}");
                failed.push(e.image);
            }
        }
    }
    if !failed.is_empty() {
        return Err(AssetLoadError::Assets { failed });
    }
    info!("preloading complete: {}/{total}", infos.len());
    Ok(infos)
}

/// Catalog and assets held in memory; listed references fail to load
#[derive(Debug, Clone)]
pub struct StaticAssets {
    catalog: TrialCatalog,
    missing: HashSet<String>,
}

impl StaticAssets {
    pub fn new(catalog: TrialCatalog) -> Self {
        Self {
            catalog,
            missing: HashSet::new(),
        }
    }

    pub fn with_missing(mut self, image: &str) -> Self {
        self.missing.insert(image.to_string());
        self
    }
}

#[async_trait]
impl AssetSource for StaticAssets {
    async fn fetch_catalog(&self) -> Result<TrialCatalog, CatalogError> {
        Ok(self.catalog.clone())
    }

    async fn preload(&self, image: &str) -> Result<AssetInfo, AssetError> {
        if self.missing.contains(image) {
            return Err(AssetError {
                image: image.to_string(),
                reason: "not found".into(),
            });
        }
        Ok(AssetInfo {
            image: image.to_string(),
            width: 380,
            height: 260,
        })
    }
}

/// `<root>/data/stimuli-config.json` plus images under `<root>/images/`
#[derive(Debug)]
pub struct DirectoryAssets {
    root: PathBuf,
    decoded: parking_lot::Mutex<HashMap<String, AssetInfo>>,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            decoded: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("data").join("stimuli-config.json")
    }

    pub fn image_path(&self, image: &str) -> PathBuf {
        self.root.join("images").join(image)
    }
}

#[async_trait]
impl AssetSource for DirectoryAssets {
    async fn fetch_catalog(&self) -> Result<TrialCatalog, CatalogError> {
        let json = tokio::fs::read_to_string(self.catalog_path()).await?;
        TrialCatalog::from_json(&json)
    }

    async fn preload(&self, image: &str) -> Result<AssetInfo, AssetError> {
        let cached = self.decoded.lock().get(image).cloned();
        if let Some(info) = cached {
            return Ok(info);
        }
        let path = self.image_path(image);
        let fail = |reason: String| AssetError {
            image: image.to_string(),
            reason,
        };
        let (width, height) = tokio::task::spawn_blocking(move || ::image::image_dimensions(path))
            .await
            .map_err(|e| fail(e.to_string()))?
            .map_err(|e| fail(e.to_string()))?;

        let info = AssetInfo {
            image: image.to_string(),
            width,
            height,
        };
        self.decoded.lock().insert(image.to_string(), info.clone());
        Ok(info)
    }
}
