//! Company logo cache
//!
//! Holds converted logo rasters keyed by company id. Entries live until
//! explicitly invalidated or the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use boleta_printer::{PrintError, PrintResult, RasterBlock, load_logo, to_device_raster};
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Converted logo rasters
#[derive(Debug, Clone)]
pub struct LogoCache {
    inner: Arc<RwLock<HashMap<String, Arc<RasterBlock>>>>,
    target_width: u32,
}

impl LogoCache {
    pub fn new(target_width: u32) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            target_width,
        }
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    /// Cached raster for a company
    pub async fn get(&self, company_id: &str) -> Option<Arc<RasterBlock>> {
        let inner = self.inner.read().await;
        inner.get(company_id).cloned()
    }

    /// Store an already converted raster
    pub async fn insert(&self, company_id: &str, raster: Arc<RasterBlock>) {
        let mut inner = self.inner.write().await;
        inner.insert(company_id.to_string(), raster);
    }

    /// Convert `source` and replace the cached entry
    ///
    /// On failure the previous entry is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self, company_id: &str, source: &str) -> PrintResult<Arc<RasterBlock>> {
        let path = source.to_string();
        let width = self.target_width;
        let raster = tokio::task::spawn_blocking(move || {
            let img = load_logo(&path, width)?;
            to_device_raster(&img)
        })
        .await
        .map_err(|e| PrintError::Io(std::io::Error::other(format!("Logo task failed: {}", e))))??;

        let raster = Arc::new(raster);
        self.insert(company_id, raster.clone()).await;
        info!(
            width = raster.width(),
            height = raster.height(),
            "Logo cached"
        );
        Ok(raster)
    }

    /// Cached raster, converting `source` on first use
    pub async fn get_or_load(
        &self,
        company_id: &str,
        source: &str,
    ) -> PrintResult<Arc<RasterBlock>> {
        if let Some(raster) = self.get(company_id).await {
            return Ok(raster);
        }
        self.refresh(company_id, source).await
    }

    pub async fn invalidate(&self, company_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.remove(company_id).is_some()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl Default for LogoCache {
    fn default() -> Self {
        Self::new(boleta_printer::raster::LOGO_TARGET_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_logo(dir: &tempfile::TempDir, name: &str, width: u32) -> String {
        let path = dir.path().join(name);
        let img = RgbaImage::from_fn(width, width / 2, |x, _| {
            if x < width / 2 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        img.save(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_refresh_populates_and_scales() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_logo(&dir, "acme.png", 760);
        let cache = LogoCache::default();

        let raster = cache.refresh("acme", &path).await.unwrap();
        assert_eq!(raster.width(), 380);
        assert_eq!(raster.height(), 190);
        assert!(Arc::ptr_eq(&cache.get("acme").await.unwrap(), &raster));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_logo(&dir, "acme.png", 100);
        let cache = LogoCache::new(64);
        cache.refresh("acme", &path).await.unwrap();

        let missing = dir.path().join("missing.png");
        assert!(
            cache
                .refresh("acme", &missing.to_string_lossy())
                .await
                .is_err()
        );
        assert_eq!(cache.get("acme").await.unwrap().width(), 64);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = LogoCache::default();
        let block = Arc::new(RasterBlock::pack(8, 1, |_, _| true).unwrap());
        cache.insert("a", block.clone()).await;
        cache.insert("b", block).await;

        assert!(cache.invalidate("a").await);
        assert!(!cache.invalidate("a").await);
        assert_eq!(cache.len().await, 1);
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_or_load_uses_cache() {
        let cache = LogoCache::default();
        let block = Arc::new(RasterBlock::pack(8, 1, |_, _| true).unwrap());
        cache.insert("acme", block.clone()).await;
        // Source is never opened when the entry exists
        let got = cache.get_or_load("acme", "/nonexistent.png").await.unwrap();
        assert!(Arc::ptr_eq(&got, &block));
    }
}
