use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{Product, ProductFields};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("product file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("product file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode products: {0}")]
    Encode(serde_json::Error),

    #[error("no product id left after {0}")]
    IdsExhausted(i64),
}

/// The product collection, persisted as one pretty-printed JSON array.
///
/// Nothing is cached: every call reloads the file, so edits made to it
/// between requests are always visible. Mutations hold `write_lock` for the
/// whole load-modify-save cycle, and saves go through a temp file that is
/// synced and then renamed over the target.
#[derive(Debug)]
pub struct ProductStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProductStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// All products in file order. A missing file is an empty collection.
    pub async fn list(&self) -> StoreResult<Vec<Product>> {
        self.load().await
    }

    pub async fn get_by_id(&self, id: i64) -> StoreResult<Option<Product>> {
        Ok(self.load().await?.into_iter().find(|p| p.id == id))
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    pub async fn add(&self, fields: ProductFields) -> StoreResult<Product> {
        let _guard = self.write_lock.lock().await;

        let mut products = self.load().await?;
        let product = Product::new(next_id(&products)?, fields);
        products.push(product.clone());
        self.save(&products).await?;

        debug!(
            id = product.id,
            fields = product.fields.len(),
            total = products.len(),
            "product appended"
        );
        Ok(product)
    }

    /// Returns `None` without touching the file when `id` is absent.
    pub async fn update(&self, id: i64, changes: ProductFields) -> StoreResult<Option<Product>> {
        let _guard = self.write_lock.lock().await;

        let mut products = self.load().await?;
        let Some(product) = products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        product.merge(changes);
        let updated = product.clone();
        self.save(&products).await?;

        debug!(id, "product rewritten");
        Ok(Some(updated))
    }

    /// Returns `false` without touching the file when `id` is absent.
    pub async fn remove(&self, id: i64) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut products = self.load().await?;
        let before = products.len();
        products.retain(|p| p.id != id);
        if products.len() == before {
            return Ok(false);
        }
        self.save(&products).await?;

        debug!(id, remaining = products.len(), "product removed");
        Ok(true)
    }

    // ── File I/O ──────────────────────────────────────────────────────────────

    async fn load(&self) -> StoreResult<Vec<Product>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, products: &[Product]) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(products).map_err(StoreError::Encode)?;
        let tmp = tmp_path(&self.path);

        let mut file = File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// One past the highest id in use, or 1 for an empty collection.
fn next_id(products: &[Product]) -> StoreResult<i64> {
    match products.iter().map(|p| p.id).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or(StoreError::IdsExhausted(max)),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
