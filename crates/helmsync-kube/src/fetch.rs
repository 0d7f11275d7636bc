//! Retrieval of certificates, keys and tokens
//!
//! Bucket objects are downloaded through each provider's CLI; the provider is
//! chosen by [`BucketScheme`], so adding a scheme forces every dispatch site to
//! handle it. Local files are copied.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use helmsync_core::{BucketObject, BucketScheme, Location};

use crate::error::{KubeError, Result};
use crate::exec::CommandExecutor;

/// Reads one object from a storage bucket into a local file
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<()>;
}

/// Object store backed by a provider CLI (`aws`, `gsutil`, `az`)
pub struct CliObjectStore {
    scheme: BucketScheme,
    executor: Arc<dyn CommandExecutor>,
}

impl CliObjectStore {
    pub fn new(scheme: BucketScheme, executor: Arc<dyn CommandExecutor>) -> Self {
        Self { scheme, executor }
    }

    fn command(&self, bucket: &str, key: &str, dest: &Path) -> (&'static str, Vec<String>) {
        let dest = dest.display().to_string();
        match self.scheme {
            BucketScheme::S3 => (
                "aws",
                vec!["s3".into(), "cp".into(), format!("s3://{bucket}/{key}"), dest],
            ),
            BucketScheme::Gcs => (
                "gsutil",
                vec!["cp".into(), format!("gs://{bucket}/{key}"), dest],
            ),
            BucketScheme::Azure => (
                "az",
                vec![
                    "storage".into(),
                    "blob".into(),
                    "download".into(),
                    "--container-name".into(),
                    bucket.into(),
                    "--name".into(),
                    key.into(),
                    "--file".into(),
                    dest,
                ],
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for CliObjectStore {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let (program, args) = self.command(bucket, key, dest);
        let location = format!("{}{bucket}/{key}", self.scheme.prefix());
        tracing::debug!(%location, dest = %dest.display(), "downloading object");

        let output = self.executor.exec(program, &args).await?;
        if output.success() {
            Ok(())
        } else {
            Err(KubeError::Fetch {
                location,
                message: output.diagnostic(),
            })
        }
    }
}

/// One object store per bucket scheme
pub struct ObjectStores {
    s3: Arc<dyn ObjectStore>,
    gcs: Arc<dyn ObjectStore>,
    azure: Arc<dyn ObjectStore>,
}

impl ObjectStores {
    /// CLI-backed stores for every scheme
    pub fn cli(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            s3: Arc::new(CliObjectStore::new(BucketScheme::S3, executor.clone())),
            gcs: Arc::new(CliObjectStore::new(BucketScheme::Gcs, executor.clone())),
            azure: Arc::new(CliObjectStore::new(BucketScheme::Azure, executor)),
        }
    }

    pub fn store(&self, scheme: BucketScheme) -> &dyn ObjectStore {
        match scheme {
            BucketScheme::S3 => self.s3.as_ref(),
            BucketScheme::Gcs => self.gcs.as_ref(),
            BucketScheme::Azure => self.azure.as_ref(),
        }
    }

    /// Place the artifact at `location` in `dest`
    pub async fn download(&self, location: &Location, dest: &Path) -> Result<()> {
        match location {
            Location::Bucket(BucketObject { scheme, bucket, key }) => {
                self.store(*scheme).fetch(bucket, key, dest).await
            }
            Location::Local(path) => {
                tracing::debug!(source = %path, dest = %dest.display(), "copying local file");
                tokio::fs::copy(path, dest)
                    .await
                    .map(|_| ())
                    .map_err(|e| KubeError::Fetch {
                        location: path.clone(),
                        message: e.to_string(),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::mock::MockExecutor;

    #[tokio::test]
    async fn test_scheme_dispatch_commands() {
        let mock = MockExecutor::new();
        let stores = ObjectStores::cli(Arc::new(mock.clone()));
        let dest = Path::new("/work/ca.crt");

        for uri in ["s3://certs/ca.crt", "gs://certs/ca.crt", "az://certs/ca.crt"] {
            stores.download(&Location::parse(uri), dest).await.unwrap();
        }

        let calls = mock.calls();
        assert_eq!(calls[0].program, "aws");
        assert_eq!(calls[0].args, vec!["s3", "cp", "s3://certs/ca.crt", "/work/ca.crt"]);
        assert_eq!(calls[1].program, "gsutil");
        assert_eq!(calls[1].args, vec!["cp", "gs://certs/ca.crt", "/work/ca.crt"]);
        assert_eq!(calls[2].program, "az");
        assert_eq!(
            calls[2].args,
            vec![
                "storage",
                "blob",
                "download",
                "--container-name",
                "certs",
                "--name",
                "ca.crt",
                "--file",
                "/work/ca.crt"
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_download() {
        let mock = MockExecutor::new();
        mock.respond(&["s3"], CommandOutput::failed(1, "AccessDenied"));
        let stores = ObjectStores::cli(Arc::new(mock));

        let err = stores
            .download(&Location::parse("s3://certs/ca.key"), Path::new("/tmp/ca.key"))
            .await
            .unwrap_err();
        match err {
            KubeError::Fetch { location, message } => {
                assert_eq!(location, "s3://certs/ca.key");
                assert_eq!(message, "AccessDenied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.crt");
        std::fs::write(&source, "CERT").unwrap();
        let dest = dir.path().join("ca.crt");

        let stores = ObjectStores::cli(Arc::new(MockExecutor::new()));
        stores
            .download(&Location::Local(source.display().to_string()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dest).unwrap(), "CERT");

        let missing = stores
            .download(&Location::Local("/no/such/file".into()), &dir.path().join("x"))
            .await;
        assert!(matches!(missing, Err(KubeError::Fetch { .. })));
    }
}
