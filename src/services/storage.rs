use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{AppError, Result};
use crate::models::Article;

const SUMMARY_SUFFIX: &str = "_summary.md";

/// Byte budget for one path component, leaving room for the longest suffix
/// under the usual 255-byte file name limit.
const MAX_NAME_BYTES: usize = 200 - SUMMARY_SUFFIX.len();

/// Location of one article's artifacts:
/// `<subscription>/<YYYY-MM-DD>/<title>{.html,.md,_summary.md}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    subscription: String,
    date: String,
    title: String,
}

impl ArtifactKey {
    pub fn new(subscription_name: &str, publish_date: DateTime<Utc>, title: &str) -> Self {
        Self {
            subscription: sanitize_filename(subscription_name),
            date: publish_date.format("%Y-%m-%d").to_string(),
            title: sanitize_filename(title),
        }
    }

    pub fn for_article(article: &Article) -> Self {
        Self::new(&article.subscription_name, article.publish_date, &article.title)
    }
}

/// Strip characters that are unsafe in file names and replace spaces.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect();

    let mut cleaned = cleaned.trim().replace(' ', "_");
    if cleaned.len() > MAX_NAME_BYTES {
        let mut end = MAX_NAME_BYTES;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }

    if cleaned.chars().all(|c| c == '.' || c == '_') {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Durable per-article files: raw HTML, cleaned markdown and the summary.
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn folder(&self, key: &ArtifactKey) -> PathBuf {
        self.base_dir.join(&key.subscription).join(&key.date)
    }

    pub fn html_path(&self, key: &ArtifactKey) -> PathBuf {
        self.folder(key).join(format!("{}.html", key.title))
    }

    pub fn markdown_path(&self, key: &ArtifactKey) -> PathBuf {
        self.folder(key).join(format!("{}.md", key.title))
    }

    pub fn summary_path(&self, key: &ArtifactKey) -> PathBuf {
        self.folder(key).join(format!("{}{SUMMARY_SUFFIX}", key.title))
    }

    pub async fn save_html(&self, key: &ArtifactKey, content: &str) -> Result<PathBuf> {
        let path = self.html_path(key);
        write_atomic(&path, content).await?;
        tracing::debug!(path = %path.display(), "Saved HTML artifact");
        Ok(path)
    }

    pub async fn save_markdown(&self, key: &ArtifactKey, content: &str) -> Result<PathBuf> {
        let path = self.markdown_path(key);
        write_atomic(&path, content).await?;
        tracing::debug!(path = %path.display(), "Saved markdown artifact");
        Ok(path)
    }

    pub async fn save_summary(&self, key: &ArtifactKey, content: &str) -> Result<PathBuf> {
        let path = self.summary_path(key);
        write_atomic(&path, content).await?;
        tracing::debug!(path = %path.display(), "Saved summary artifact");
        Ok(path)
    }

    pub async fn read_markdown(&self, key: &ArtifactKey) -> Result<String> {
        Ok(tokio::fs::read_to_string(self.markdown_path(key)).await?)
    }

    /// Whether content resolution for this article has completed.
    pub async fn markdown_exists(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.markdown_path(key)).await?)
    }

    /// Delete files not modified in the last `days` days, then prune
    /// directories left empty. Returns the number of files removed.
    pub fn cleanup_older_than(&self, days: u64) -> Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(days * 24 * 60 * 60))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;

        for entry in WalkDir::new(&self.base_dir).min_depth(1).into_iter().flatten() {
            if !entry.file_type().is_file() {
                continue;
            }

            let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                Some(modified) => modified,
                None => continue,
            };

            if modified < cutoff {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => {
                        removed += 1;
                        tracing::debug!(path = %entry.path().display(), "Deleted old artifact");
                    }
                    Err(e) => {
                        tracing::warn!(path = %entry.path().display(), error = %e, "Failed to delete artifact")
                    }
                }
            }
        }

        // Children come before their parents, so nested empty folders collapse
        for entry in WalkDir::new(&self.base_dir)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .flatten()
        {
            if entry.file_type().is_dir() {
                // Fails harmlessly when the directory is not empty
                let _ = std::fs::remove_dir(entry.path());
            }
        }

        Ok(removed)
    }
}

/// Write through a uniquely named temp file in the target folder, then
/// rename over `path`. A crash never leaves a truncated artifact that looks
/// complete, and concurrent writers of the same artifact do not collide.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    tokio::fs::create_dir_all(&parent).await?;

    let path = path.to_path_buf();
    let content = content.to_owned();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&path)?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Other(e.into()))??;

    Ok(())
}
