//! Filesystem-backed résumé store.
//!
//! Layout under the root directory, per résumé id:
//! - `<id>.pdf`  — the uploaded document
//! - `<id>.json` — metadata sidecar (`ResumeMetadata`)
//! - `<id>.png`  — optional preview image, produced outside this service

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

const MAX_ID_LEN: usize = 80;
const FALLBACK_ID: &str = "cv";
/// Listing fields computed from the file itself; sidecar keys never override them.
const DERIVED_KEYS: &[&str] = &["id", "name", "size", "mtimeMs"];

/// Sidecar metadata written next to every uploaded résumé.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMetadata {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_thumbnail: bool,
    /// Any other sidecar keys, carried through to the listing untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of the résumé listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeItem {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mtime_ms: i64,
    pub has_thumbnail: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResume {
    pub id: String,
    pub name: String,
    pub has_thumbnail: bool,
}

#[derive(Debug, Clone)]
pub struct ResumeStore {
    root: PathBuf,
}

impl ResumeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.pdf"))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn preview_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.png"))
    }

    /// Maps a résumé id to its stored document, if one exists.
    ///
    /// Ids outside the sanitized alphabet never resolve.
    pub async fn resolve(&self, id: &str) -> Option<PathBuf> {
        if !is_safe_id(id) {
            return None;
        }
        let path = self.document_path(id);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            _ => None,
        }
    }

    /// Lists every stored résumé, most recently modified first.
    pub async fn list(&self) -> io::Result<Vec<ResumeItem>> {
        self.ensure_dir().await?;

        let mut items = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if !is_pdf {
                continue;
            }
            let (Some(id), Some(name)) = (
                path.file_stem().and_then(|s| s.to_str()).map(str::to_string),
                path.file_name().and_then(|s| s.to_str()).map(str::to_string),
            ) else {
                continue;
            };

            let stat = entry.metadata().await?;
            if !stat.is_file() {
                continue;
            }
            let mtime_ms = stat
                .modified()
                .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
                .unwrap_or_default();

            let mut metadata = self.read_metadata(&id).await.unwrap_or_default();
            metadata.extra.retain(|key, _| !DERIVED_KEYS.contains(&key.as_str()));
            let has_preview = tokio::fs::try_exists(self.preview_path(&id))
                .await
                .unwrap_or(false);

            items.push(ResumeItem {
                has_thumbnail: has_preview || metadata.has_thumbnail,
                email: metadata.email,
                uploaded_at: metadata.uploaded_at,
                extra: metadata.extra,
                size: stat.len(),
                mtime_ms,
                id,
                name,
            });
        }

        items.sort_by(|a, b| b.mtime_ms.cmp(&a.mtime_ms).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    /// Reads the sidecar for `id`. Missing or malformed sidecars yield `None`.
    async fn read_metadata(&self, id: &str) -> Option<ResumeMetadata> {
        let raw = tokio::fs::read(self.metadata_path(id)).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Failed to parse metadata for {id}: {e}");
                None
            }
        }
    }

    /// Writes an uploaded document and its sidecar, replacing any résumé
    /// with the same sanitized id.
    pub async fn save(&self, name: &str, email: &str, bytes: &[u8]) -> io::Result<StoredResume> {
        self.ensure_dir().await?;

        let id = sanitize_id(name);
        tokio::fs::write(self.document_path(&id), bytes).await?;

        let has_thumbnail = tokio::fs::try_exists(self.preview_path(&id))
            .await
            .unwrap_or(false);
        let metadata = ResumeMetadata {
            email: Some(email.to_string()),
            uploaded_at: Some(Utc::now()),
            has_thumbnail,
            extra: Map::new(),
        };
        let json = serde_json::to_vec(&metadata).map_err(io::Error::other)?;
        tokio::fs::write(self.metadata_path(&id), json).await?;

        info!("Stored resume {id} ({} bytes)", bytes.len());

        Ok(StoredResume {
            name: format!("{id}.pdf"),
            id,
            has_thumbnail,
        })
    }
}

/// Keeps `[A-Za-z0-9_-]`, truncates to 80 characters, falls back to `"cv"`.
pub fn sanitize_id(name: &str) -> String {
    let id: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_ID_LEN)
        .collect();
    if id.is_empty() {
        FALLBACK_ID.to_string()
    } else {
        id
    }
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
