// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Filesystem key store.
//!
//! Keys map to files below a root directory:
//! `{root}/{key}`, with intermediate directories created on write.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use super::{KeyStore, normalize_path};
use crate::error::{Error, RequiredFields, Result};

/// Key store backed by a local directory.
#[derive(Debug, Clone)]
pub struct FilesystemKeyStore {
    root: String,
    dir: PathBuf,
}

impl FilesystemKeyStore {
    /// Create a store rooted at `path`.
    ///
    /// Empty segments are stripped from `path`; an absolute path stays anchored at `/`.
    pub fn new(path: &str) -> Result<Self> {
        let mut fields = RequiredFields::new("FilesystemKeyStore");
        let path = fields.require("path", Some(path));
        fields.finish()?;

        let root = normalize_path(path);
        if root.is_empty() {
            return Err(Error::MissingFields {
                context: "FilesystemKeyStore",
                fields: vec!["path"],
            });
        }

        let dir = if path.starts_with('/') {
            PathBuf::from("/").join(&root)
        } else {
            PathBuf::from(&root)
        };

        Ok(Self { root, dir })
    }

    /// Directory all keys are stored under.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(normalize_path(key))
    }

    fn display_key(&self, key: &str) -> String {
        format!("{}/{}", self.root, normalize_path(key))
    }
}

#[async_trait]
impl KeyStore for FilesystemKeyStore {
    fn backend_type(&self) -> &'static str {
        "filesystem"
    }

    fn root(&self) -> &str {
        &self.root
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.file_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(self.display_key(key), e))?;
        }
        fs::write(&path, value)
            .await
            .map_err(|e| Error::io(self.display_key(key), e))?;

        debug!(path = %path.display(), bytes = value.len(), "Wrote key");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.file_path(key);
        fs::read(&path)
            .await
            .map_err(|e| Error::io(self.display_key(key), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir, sub: &str) -> FilesystemKeyStore {
        let path = format!("{}/{}", temp.path().display(), sub);
        FilesystemKeyStore::new(&path).unwrap()
    }

    #[tokio::test]
    async fn test_write_creates_intermediate_directories() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp, "archives//demo/");

        store.write("i-1/user_data", b"#cloud-config\n").await.unwrap();

        let on_disk = temp.path().join("archives/demo/i-1/user_data");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"#cloud-config\n");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp, "archives");

        store.write("k", b"first").await.unwrap();
        store.write("k", b"second").await.unwrap();

        assert_eq!(store.read("k").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp, "archives");

        let err = store.read("i-404/instance.yaml").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_absolute_root_is_kept() {
        let store = FilesystemKeyStore::new("//var/lib//cloud-maker/").unwrap();
        assert_eq!(store.root(), "var/lib/cloud-maker");
        assert_eq!(store.dir(), std::path::Path::new("/var/lib/cloud-maker"));
    }

    #[test]
    fn test_empty_root_rejected() {
        assert!(FilesystemKeyStore::new("").unwrap_err().is_configuration());
        assert!(FilesystemKeyStore::new("//").unwrap_err().is_configuration());
    }
}
