//! The two file buckets. Public files (profile photos) are served as they
//! are, private files (police clearances, conduct codes) only through urls
//! signed with HMAC-SHA256 that expire.

use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use facility_booking_config::StorageConfig;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Public,
    Private,
}

impl Bucket {
    const fn directory(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("invalid storage signing secret")]
    InvalidSecret,
    #[error("signed url ttl is out of range")]
    InvalidTtl,
    #[error("invalid file name {0:?}")]
    InvalidKey(String),
    #[error("the link has expired")]
    Expired,
    #[error("invalid signature")]
    BadSignature,
    #[error("file not found")]
    NotFound,
    #[error("unsupported file type {0}")]
    UnsupportedType(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidKey(_) | Self::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            Self::Expired | Self::BadSignature => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidSecret | Self::InvalidTtl | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub struct Storage {
    root: PathBuf,
    mac: HmacSha256,
    ttl: Duration,
}

/// Keys are relative paths of plain segments, so they can never leave the
/// bucket directory.
pub fn validate_key(key: &str) -> Result<&str, StorageError> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && !segment.starts_with('.')
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });
    if valid {
        Ok(key)
    } else {
        Err(StorageError::InvalidKey(key.to_owned()))
    }
}

/// File extension for the accepted upload types.
pub fn extension_for(content_type: &str) -> Result<&'static str, StorageError> {
    let mime: mime::Mime = content_type
        .parse()
        .map_err(|_| StorageError::UnsupportedType(content_type.to_owned()))?;
    match (mime.type_(), mime.subtype()) {
        (mime::IMAGE, mime::JPEG) => Ok("jpg"),
        (mime::IMAGE, mime::PNG) => Ok("png"),
        (mime::IMAGE, subtype) if subtype == "webp" => Ok("webp"),
        (mime::APPLICATION, mime::PDF) => Ok("pdf"),
        _ => Err(StorageError::UnsupportedType(content_type.to_owned())),
    }
}

#[must_use]
pub fn content_type_for(key: &str) -> mime::Mime {
    match Path::new(key).extension().and_then(|ext| ext.to_str()) {
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("pdf") => mime::APPLICATION_PDF,
        Some("webp") => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

impl Storage {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let mac = HmacSha256::new_from_slice(config.signing_secret.as_bytes())
            .map_err(|_| StorageError::InvalidSecret)?;
        Ok(Self {
            root: config.root.clone(),
            mac,
            ttl: i64::try_from(config.signed_url_ttl_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .ok_or(StorageError::InvalidTtl)?,
        })
    }

    #[must_use]
    pub fn directory(&self, bucket: Bucket) -> PathBuf {
        self.root.join(bucket.directory())
    }

    fn path(&self, bucket: Bucket, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.directory(bucket).join(validate_key(key)?))
    }

    pub async fn store(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!("stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    pub async fn read(&self, bucket: Bucket, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(error) => Err(error.into()),
        }
    }

    /// Deletes a file. A file that is already gone is not an error.
    pub async fn remove(&self, bucket: Bucket, key: &str) -> Result<(), StorageError> {
        let path = self.path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("removed {}", path.display());
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Removes `previous` after `current` took its place. The database
    /// already points at `current`, so a failure is only logged.
    pub async fn discard_replaced(&self, bucket: Bucket, previous: Option<&str>, current: &str) {
        let Some(previous) = previous.filter(|previous| *previous != current) else {
            return;
        };
        if let Err(error) = self.remove(bucket, previous).await {
            warn!("could not remove replaced file {previous}: {error}");
        }
    }

    fn mac_for(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    #[must_use]
    pub fn sign(&self, key: &str, expires: i64) -> String {
        hex::encode(self.mac_for(key, expires).finalize().into_bytes())
    }

    pub fn signed_url(
        &self,
        base_url: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<SignedUrl, StorageError> {
        let key = validate_key(key)?;
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(StorageError::InvalidTtl)?;
        let expires = expires_at.timestamp();
        Ok(SignedUrl {
            url: format!(
                "{}/storage/private/{key}?expires={expires}&signature={}",
                base_url.trim_end_matches('/'),
                self.sign(key, expires)
            ),
            expires_at,
        })
    }

    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let signature = hex::decode(signature).map_err(|_| StorageError::BadSignature)?;
        self.mac_for(key, expires)
            .verify_slice(&signature)
            .map_err(|_| StorageError::BadSignature)?;
        if now.timestamp() > expires {
            return Err(StorageError::Expired);
        }
        Ok(())
    }
}
