//! Image stores and the resolver that feeds archive images into them.

use std::future::Future;
use std::path::{Path, PathBuf};

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use quizbank_extractor::ImageResolver;
use quizbank_shared::{ImageBackendKind, ImagesConfig, QuizbankError, Result};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::archive::{base_name, find_file_by_name};

/// Somewhere image files can be published. Returns the public URL.
pub trait ImageStore: Send + Sync {
    fn upload(&self, path: &Path, key: &str) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

/// Uploads to an S3 bucket with static credentials read from the environment.
#[derive(Debug, Clone)]
pub struct S3ImageStore {
    /// `None` when credentials were missing at startup; uploads then fail.
    client: Option<Client>,
    bucket: String,
    region: String,
    public_base_url: Option<Url>,
}

impl S3ImageStore {
    pub fn from_config(config: &ImagesConfig) -> Result<Self> {
        let access_key = std::env::var(&config.access_key_env).ok().filter(|v| !v.is_empty());
        let secret_key = std::env::var(&config.secret_key_env).ok().filter(|v| !v.is_empty());

        let client = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "quizbank-config");
                let s3_config = aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .credentials_provider(credentials)
                    .build();
                Some(Client::from_conf(s3_config))
            }
            _ => {
                warn!(
                    access_key_env = %config.access_key_env,
                    secret_key_env = %config.secret_key_env,
                    "AWS credentials not set, image uploads will fail"
                );
                None
            }
        };

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            public_base_url: parse_base_url(config.public_base_url.as_deref())?,
        })
    }

    fn object_url(&self, key: &str) -> Result<String> {
        match &self.public_base_url {
            Some(base) => public_url(base, key),
            None => Ok(format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                self.bucket, self.region
            )),
        }
    }
}

impl ImageStore for S3ImageStore {
    #[instrument(skip(self, path), fields(bucket = %self.bucket))]
    async fn upload(&self, path: &Path, key: &str) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| QuizbankError::ObjectStorage("AWS credentials not found".into()))?;

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| QuizbankError::ObjectStorage(format!("{}: {e}", path.display())))?;

        let mut request = client.put_object().bucket(&self.bucket).key(key).body(body);
        if let Some(content_type) = content_type(path) {
            request = request.content_type(content_type);
        }
        request
            .send()
            .await
            .map_err(|e| QuizbankError::ObjectStorage(DisplayErrorContext(&e).to_string()))?;

        debug!(key, "uploaded image");
        self.object_url(key)
    }
}

fn content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Local directory
// ---------------------------------------------------------------------------

/// Copies images into a directory served elsewhere under `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    public_base_url: Url,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: Url) -> Self {
        Self {
            root: root.into(),
            public_base_url,
        }
    }

    pub fn from_config(config: &ImagesConfig) -> Result<Self> {
        let base = parse_base_url(config.public_base_url.as_deref())?.ok_or_else(|| {
            QuizbankError::config("images.public_base_url must be set for the local backend")
        })?;
        Ok(Self::new(&config.local_dir, base))
    }
}

impl ImageStore for LocalImageStore {
    #[instrument(skip(self, path))]
    async fn upload(&self, path: &Path, key: &str) -> Result<String> {
        let target = key
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, seg| acc.join(seg));
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| QuizbankError::io(parent, e))?;
        }
        tokio::fs::copy(path, &target)
            .await
            .map_err(|e| QuizbankError::io(&target, e))?;

        debug!(target = %target.display(), "copied image");
        public_url(&self.public_base_url, key)
    }
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// The configured store, picked once at startup.
#[derive(Debug, Clone)]
pub enum ImageBackend {
    S3(S3ImageStore),
    Local(LocalImageStore),
}

impl ImageBackend {
    pub fn from_config(config: &ImagesConfig) -> Result<Self> {
        Ok(match config.backend {
            ImageBackendKind::S3 => Self::S3(S3ImageStore::from_config(config)?),
            ImageBackendKind::Local => Self::Local(LocalImageStore::from_config(config)?),
        })
    }
}

impl ImageStore for ImageBackend {
    async fn upload(&self, path: &Path, key: &str) -> Result<String> {
        match self {
            Self::S3(store) => store.upload(path, key).await,
            Self::Local(store) => store.upload(path, key).await,
        }
    }
}

fn parse_base_url(raw: Option<&str>) -> Result<Option<Url>> {
    raw.map(|s| {
        Url::parse(s)
            .map_err(|e| QuizbankError::config(format!("images.public_base_url is not a URL: {e}")))
    })
    .transpose()
}

/// Append the `/`-separated `key` to `base` as path segments.
pub fn public_url(base: &Url, key: &str) -> Result<String> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| QuizbankError::config(format!("cannot use {base} as a base URL")))?
        .pop_if_empty()
        .extend(key.split('/').filter(|s| !s.is_empty()));
    Ok(url.into())
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves document image references against an extracted archive and
/// publishes them through an [`ImageStore`].
///
/// Files are matched by base name anywhere in the tree, so documents whose
/// `src` paths do not mirror the archive layout still resolve.
pub struct ArchiveImageResolver<'a, S> {
    root: &'a Path,
    store: &'a S,
    key_prefix: &'a str,
}

impl<'a, S: ImageStore> ArchiveImageResolver<'a, S> {
    pub fn new(root: &'a Path, store: &'a S, key_prefix: &'a str) -> Self {
        Self {
            root,
            store,
            key_prefix,
        }
    }

    fn object_key(&self, name: &str) -> String {
        match self.key_prefix.trim_matches('/') {
            "" => name.to_string(),
            prefix => format!("{prefix}/{name}"),
        }
    }
}

impl<S: ImageStore> ImageResolver for ArchiveImageResolver<'_, S> {
    async fn resolve(&self, src: &str) -> Result<String> {
        let name = base_name(src).to_string();
        let root = self.root.to_path_buf();
        let lookup = name.clone();
        let found = tokio::task::spawn_blocking(move || find_file_by_name(&root, &lookup))
            .await
            .map_err(|e| QuizbankError::Internal(format!("image lookup task failed: {e}")))??;

        let path = found.ok_or_else(|| QuizbankError::ImageNotFound {
            src: src.to_string(),
        })?;
        self.store.upload(&path, &self.object_key(&name)).await
    }
}
