//! Post Sources - where raw posts come from
//!
//! A source discovers the posts it can serve and fetches each one's raw
//! content. Three layouts are supported, all rooted at `<root>`:
//!
//! - **directory**: list `<root>/<posts_dir>` on the local disk
//! - **manifest**: read `<root>/<manifest>` (one filename per line)
//! - **http**: GET the manifest and the posts from a base URL

use crate::config::{PostsConfig, SourceKind};
use crate::ingest::error::SourceError;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

/// A discoverable post: where it lives and the id it will be stored under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostRef {
    /// Location relative to the source root, e.g. `txt/hello.md`
    pub path: String,
    /// Filename without extension
    pub id: String,
}

impl PostRef {
    /// Build a reference from a filename inside `posts_dir`
    ///
    /// Returns `None` for names with no usable stem.
    pub fn from_filename(posts_dir: &str, filename: &str) -> Option<Self> {
        let id = Path::new(filename).file_stem()?.to_str()?;
        if id.is_empty() {
            return None;
        }

        let path = if posts_dir.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", posts_dir.trim_end_matches('/'), filename)
        };

        Some(Self {
            path,
            id: id.to_string(),
        })
    }
}

/// Parse a newline-delimited manifest of post filenames
pub fn parse_manifest(content: &str, posts_dir: &str) -> Vec<PostRef> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| PostRef::from_filename(posts_dir, line))
        .collect()
}

/// Capability to list and read raw posts
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Every post this source can serve
    async fn discover(&self) -> Result<Vec<PostRef>, SourceError>;

    /// Raw content of one post
    async fn fetch(&self, post: &PostRef) -> Result<String, SourceError>;
}

/// Build the source described by the `[posts]` config section
pub fn from_config(config: &PostsConfig) -> Result<Arc<dyn PostSource>, SourceError> {
    let source: Arc<dyn PostSource> = match config.source {
        SourceKind::Directory => Arc::new(DirectorySource::new(&config.root, &config.posts_dir)),
        SourceKind::Manifest => Arc::new(ManifestSource::new(
            &config.root,
            &config.posts_dir,
            &config.manifest,
        )),
        SourceKind::Http => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                SourceError::Config("posts.base_url is required for the http source".to_string())
            })?;
            Arc::new(HttpSource::new(
                base_url,
                &config.posts_dir,
                &config.manifest,
                Duration::from_secs(config.request_timeout_secs),
            )?)
        }
    };

    tracing::debug!("Using {} post source", source.name());
    Ok(source)
}

/// Lists the posts directory on the local disk
pub struct DirectorySource {
    root: PathBuf,
    posts_dir: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, posts_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            posts_dir: posts_dir.into(),
        }
    }
}

#[async_trait]
impl PostSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn discover(&self) -> Result<Vec<PostRef>, SourceError> {
        let dir = self.root.join(&self.posts_dir);
        let mut posts = Vec::new();

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(filename) = entry.file_name().to_str() else {
                tracing::warn!("Skipping non UTF-8 filename {:?}", entry.path());
                continue;
            };
            if filename.starts_with('.') {
                continue;
            }

            if let Some(post) = PostRef::from_filename(&self.posts_dir, filename) {
                posts.push(post);
            }
        }

        // Sort for deterministic ordering
        posts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(posts)
    }

    async fn fetch(&self, post: &PostRef) -> Result<String, SourceError> {
        read_file(&self.root.join(&post.path)).await
    }
}

/// Reads the manifest and posts from the local disk
pub struct ManifestSource {
    root: PathBuf,
    posts_dir: String,
    manifest: String,
}

impl ManifestSource {
    pub fn new(
        root: impl Into<PathBuf>,
        posts_dir: impl Into<String>,
        manifest: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            posts_dir: posts_dir.into(),
            manifest: manifest.into(),
        }
    }
}

#[async_trait]
impl PostSource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn discover(&self) -> Result<Vec<PostRef>, SourceError> {
        let content = read_file(&self.root.join(&self.manifest)).await?;
        Ok(parse_manifest(&content, &self.posts_dir))
    }

    async fn fetch(&self, post: &PostRef) -> Result<String, SourceError> {
        read_file(&self.root.join(&post.path)).await
    }
}

/// Fetches the manifest and posts over HTTP
pub struct HttpSource {
    client: Client,
    base_url: String,
    posts_dir: String,
    manifest: String,
}

impl HttpSource {
    pub fn new(
        base_url: &str,
        posts_dir: impl Into<String>,
        manifest: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            posts_dir: posts_dir.into(),
            manifest: manifest.into(),
        })
    }

    /// URL of a path relative to the base, each segment percent-encoded
    pub fn url_for(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url, encoded.join("/"))
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PostSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn discover(&self) -> Result<Vec<PostRef>, SourceError> {
        let content = self.get_text(&self.url_for(&self.manifest)).await?;
        Ok(parse_manifest(&content, &self.posts_dir))
    }

    async fn fetch(&self, post: &PostRef) -> Result<String, SourceError> {
        self.get_text(&self.url_for(&post.path)).await
    }
}

async fn read_file(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::io(path.display().to_string(), e))
}
