use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use tokio::fs;

use crate::{
    cache::{cache_key, get_root_cache_dir},
    error::StoreError,
    types::VideoAnalysisDocument,
};

/// Persistence for reconciled documents, keyed by video id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, video_id: &str, document: &VideoAnalysisDocument)
    -> Result<(), StoreError>;

    /// `Ok(None)` when nothing was saved for `video_id`.
    async fn load(&self, video_id: &str) -> Result<Option<VideoAnalysisDocument>, StoreError>;
}

/// Writes one pretty-printed JSON file per video.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", file_stem(video_id)))
    }
}

impl Default for FsDocumentStore {
    fn default() -> Self {
        Self::new(get_root_cache_dir().join("documents"))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Maps a video id to a file stem that cannot escape the store root.
///
/// Ids made only of ASCII alphanumerics, `-` and `_` are used as is. Any
/// other id is sanitized and suffixed with `.` and a hash of the raw id;
/// `.` never occurs in a plain stem, so distinct ids get distinct files.
fn file_stem(video_id: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !video_id.is_empty() && video_id.chars().all(is_safe) {
        return video_id.to_string();
    }

    let sanitized: String = video_id
        .trim()
        .chars()
        .map(|c| if is_safe(c) { c } else { '_' })
        .collect();
    let base = if sanitized.is_empty() {
        "default"
    } else {
        sanitized.as_str()
    };
    format!("{base}.{}", &cache_key(video_id)[..16])
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn save(
        &self,
        video_id: &str,
        document: &VideoAnalysisDocument,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(io_error(&self.root))?;

        let path = self.document_path(video_id);
        let tmp_path = path.with_extension("json.tmp");
        let pretty_json = serde_json::to_string_pretty(document)?;
        fs::write(&tmp_path, &pretty_json)
            .await
            .map_err(io_error(&tmp_path))?;
        fs::rename(&tmp_path, &path).await.map_err(io_error(&path))?;
        Ok(())
    }

    async fn load(&self, video_id: &str) -> Result<Option<VideoAnalysisDocument>, StoreError> {
        let path = self.document_path(video_id);
        let json_content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&path)(err)),
        };
        Ok(Some(serde_json::from_str(&json_content)?))
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, VideoAnalysisDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VideoAnalysisDocument>> {
        match self.documents.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save(
        &self,
        video_id: &str,
        document: &VideoAnalysisDocument,
    ) -> Result<(), StoreError> {
        self.lock().insert(video_id.to_string(), document.clone());
        Ok(())
    }

    async fn load(&self, video_id: &str) -> Result<Option<VideoAnalysisDocument>, StoreError> {
        Ok(self.lock().get(video_id).cloned())
    }
}
