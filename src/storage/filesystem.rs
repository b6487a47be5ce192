//! Local directory provider.
//!
//! Payloads are sharded beneath
//! `root/objects/{bucket}/{shard}/{shard}/{physical_key}` and a small JSON
//! sidecar with the content type and etag is kept under `root/meta/` with the
//! same relative path. Writes go to a temp file that is fsynced and renamed
//! into place, so readers never observe a half-written object.

use super::backend::{
    BackendError, BackendObject, BackendResult, ByteStream, ObjectBackend, PutOptions,
    ensure_key_safe,
};
use crate::models::ObjectLocation;
use async_trait::async_trait;
use futures::StreamExt;
use md5::Context;
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct Sidecar {
    content_type: Option<String>,
    etag: String,
}

#[derive(Clone, Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Two-level shard identifiers: first two bytes of MD5(bucket/key) as hex.
    fn shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn sharded_path(&self, area: &str, location: &ObjectLocation) -> BackendResult<PathBuf> {
        let bucket = &location.provider_bucket;
        if bucket.is_empty() || bucket.contains('/') || bucket == ".." {
            return Err(BackendError::Misconfigured(format!(
                "invalid provider bucket `{}`",
                bucket
            )));
        }
        ensure_key_safe(&location.physical_key)?;

        let (shard_a, shard_b) = Self::shards(bucket, &location.physical_key);
        let mut path = self.root.join(area);
        path.push(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(&location.physical_key);
        Ok(path)
    }

    fn object_path(&self, location: &ObjectLocation) -> BackendResult<PathBuf> {
        self.sharded_path("objects", location)
    }

    fn sidecar_path(&self, location: &ObjectLocation) -> BackendResult<PathBuf> {
        let mut path = self.sharded_path("meta", location)?;
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".json");
        path.set_file_name(name);
        Ok(path)
    }

    fn not_found(location: &ObjectLocation) -> BackendError {
        BackendError::NotFound {
            bucket: location.provider_bucket.clone(),
            key: location.physical_key.clone(),
        }
    }

    /// Write `body` to a temp file beside `path`, then rename it into place.
    /// Returns the MD5 hex digest and the number of bytes written.
    async fn write_atomically(path: &Path, mut body: ByteStream) -> io::Result<(String, i64)> {
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut written: i64 = 0;
        let mut digest = Context::new();
        let copied: io::Result<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                written += chunk.len() as i64;
                digest.consume(&chunk);
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = copied {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(path).await?;
                fs::rename(&tmp_path, path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        }

        Ok((format!("{:x}", digest.compute()), written))
    }

    /// Remove empty directories from `start` up to (not including) `stop`.
    async fn prune_empty_dirs(start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectBackend for FilesystemBackend {
    async fn put(
        &self,
        location: &ObjectLocation,
        body: ByteStream,
        _size: i64,
        options: &PutOptions,
    ) -> BackendResult<String> {
        let path = self.object_path(location)?;
        let sidecar_path = self.sidecar_path(location)?;

        let (etag, written) = Self::write_atomically(&path, body).await?;

        let sidecar = Sidecar {
            content_type: options.content_type.clone(),
            etag: etag.clone(),
        };
        let encoded = serde_json::to_vec(&sidecar).map_err(io::Error::other)?;
        if let Some(parent) = sidecar_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&sidecar_path, encoded).await?;

        debug!(
            "stored {} bytes at {} ({})",
            written,
            path.display(),
            location
        );
        Ok(etag)
    }

    async fn get(&self, location: &ObjectLocation) -> BackendResult<BackendObject> {
        let path = self.object_path(location)?;
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                Self::not_found(location)
            } else {
                BackendError::Io(err)
            }
        })?;
        let size = file.metadata().await?.len() as i64;

        let content_type = match fs::read(self.sidecar_path(location)?).await {
            Ok(raw) => serde_json::from_slice::<Sidecar>(&raw)
                .ok()
                .and_then(|s| s.content_type),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(BackendError::Io(err)),
        };

        Ok(BackendObject {
            body: ReaderStream::new(file).boxed(),
            size,
            content_type,
        })
    }

    async fn delete(&self, location: &ObjectLocation) -> BackendResult<()> {
        let path = self.object_path(location)?;
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed physical file {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(Self::not_found(location)),
            Err(err) => return Err(BackendError::Io(err)),
        }

        let sidecar_path = self.sidecar_path(location)?;
        if let Err(err) = fs::remove_file(&sidecar_path).await {
            if err.kind() != ErrorKind::NotFound {
                debug!("failed to remove sidecar {}: {}", sidecar_path.display(), err);
            }
        }

        for (area, leaf) in [("objects", &path), ("meta", &sidecar_path)] {
            if let Some(parent) = leaf.parent() {
                let stop = self.root.join(area).join(&location.provider_bucket);
                Self::prune_empty_dirs(parent, &stop).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderType;
    use crate::storage::backend::{bytes_stream, collect_stream};
    use bytes::Bytes;

    fn location(key: &str) -> ObjectLocation {
        ObjectLocation {
            provider_type: ProviderType::LocalFs,
            provider_region: String::new(),
            provider_bucket: "phys-assets".into(),
            physical_key: key.into(),
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_bytes_and_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let loc = location("prod/us/assets/a.png");
        let options = PutOptions {
            content_type: Some("image/png".into()),
            ..PutOptions::default()
        };

        let etag = backend
            .put(&loc, bytes_stream(Bytes::from_static(b"png-bytes")), 9, &options)
            .await
            .unwrap();
        assert_eq!(etag, format!("{:x}", md5::compute(b"png-bytes")));

        let object = backend.get(&loc).await.unwrap();
        assert_eq!(object.size, 9);
        assert_eq!(object.content_type.as_deref(), Some("image/png"));
        let data = collect_stream(object.body).await.unwrap();
        assert_eq!(&data[..], b"png-bytes");
    }

    #[tokio::test]
    async fn overwrite_replaces_payload() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let loc = location("prod/us/assets/doc.txt");
        let options = PutOptions::default();

        backend
            .put(&loc, bytes_stream(Bytes::from_static(b"v1")), 2, &options)
            .await
            .unwrap();
        backend
            .put(&loc, bytes_stream(Bytes::from_static(b"version two")), 11, &options)
            .await
            .unwrap();

        let object = backend.get(&loc).await.unwrap();
        assert_eq!(object.size, 11);
        assert_eq!(object.content_type, None);
    }

    #[tokio::test]
    async fn delete_removes_object_and_prunes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let loc = location("prod/us/assets/nested/file.bin");

        backend
            .put(&loc, bytes_stream(Bytes::from_static(b"x")), 1, &PutOptions::default())
            .await
            .unwrap();
        backend.delete(&loc).await.unwrap();

        assert!(matches!(
            backend.get(&loc).await,
            Err(BackendError::NotFound { .. })
        ));
        let bucket_dir = dir.path().join("objects").join("phys-assets");
        let mut entries = fs::read_dir(&bucket_dir).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let err = backend.get(&location("nope")).await.err().unwrap();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let err = backend
            .put(
                &location("../../escape"),
                bytes_stream(Bytes::from_static(b"x")),
                1,
                &PutOptions::default(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::InvalidKey(_)));
    }
}
