//! URI and bucket location parsing
//!
//! Certificates, bearer tokens and state-relative references can point at a
//! local file or at an object in one of three cloud storage providers.

use std::fmt;
use std::path::Path;

/// Whether `value` is usable as a request URI: an absolute path, or an
/// absolute URI with a hierarchical part. Opaque `scheme:rest` strings such
/// as `host:6443` are rejected.
pub fn is_request_uri(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    if value.starts_with('/') {
        return true;
    }
    url::Url::parse(value).is_ok_and(|url| !url.cannot_be_a_base())
}

/// Supported object-storage providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketScheme {
    /// Amazon S3 (`s3://`)
    S3,
    /// Google Cloud Storage (`gs://`)
    Gcs,
    /// Azure Blob Storage (`az://`)
    Azure,
}

impl BucketScheme {
    pub const ALL: [BucketScheme; 3] = [BucketScheme::S3, BucketScheme::Gcs, BucketScheme::Azure];

    pub fn prefix(self) -> &'static str {
        match self {
            BucketScheme::S3 => "s3://",
            BucketScheme::Gcs => "gs://",
            BucketScheme::Azure => "az://",
        }
    }
}

impl fmt::Display for BucketScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BucketScheme::S3 => "s3",
            BucketScheme::Gcs => "gs",
            BucketScheme::Azure => "az",
        };
        f.write_str(name)
    }
}

/// An object inside a bucket: `<scheme>://<bucket>/<key>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketObject {
    pub scheme: BucketScheme,
    pub bucket: String,
    pub key: String,
}

impl BucketObject {
    /// Parse a bucket URI. Returns `None` for unknown schemes or when the
    /// bucket or key part is missing.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let scheme = BucketScheme::ALL
            .into_iter()
            .find(|s| value.starts_with(s.prefix()))?;
        let rest = &value[scheme.prefix().len()..];
        let (bucket, key) = rest.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self {
            scheme,
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for BucketObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", self.scheme.prefix(), self.bucket, self.key)
    }
}

/// Where a certificate, key or token lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Bucket(BucketObject),
    Local(String),
}

impl Location {
    /// Classify a reference. Anything that is not a recognised bucket URI is
    /// treated as a local path.
    pub fn parse(value: &str) -> Self {
        match BucketObject::parse(value) {
            Some(object) => Location::Bucket(object),
            None => Location::Local(value.to_string()),
        }
    }

    /// Resolve a certificate reference: a bucket URI with a recognised
    /// scheme, or a local file that exists.
    pub fn resolve_existing(value: &str) -> Option<Self> {
        if is_request_uri(value) {
            if let Some(object) = BucketObject::parse(value) {
                return Some(Location::Bucket(object));
            }
        }
        if Path::new(value).exists() {
            return Some(Location::Local(value.to_string()));
        }
        None
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Bucket(object) => object.fmt(f),
            Location::Local(path) => f.write_str(path),
        }
    }
}
