//! Blob Store
//!
//! content root 아래에 업로드 원본 파일을 저장/삭제합니다.
//! 저장소는 버전 의미를 전혀 모르며, 키(상대 경로) → 바이트 매핑만 책임집니다.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::utils::{sanitize_filename, validate_relative_key};

/// 업로드 키 prefix
const CHAPTER_NAMESPACE: &str = "chapters";

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io {
                key: key.to_string(),
                source,
            }
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Local filesystem blob store.
///
/// ```text
/// {root}/
///   chapters/
///     group-{g}/
///       chapter-{c}/
///         {uuid}-{sanitized filename}
/// ```
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 새 업로드용 키 생성 (업로드마다 고유)
    pub fn chapter_key(group_id: i64, chapter_number: i64, original_filename: &str) -> String {
        format!(
            "{}/group-{}/chapter-{}/{}-{}",
            CHAPTER_NAMESPACE,
            group_id,
            chapter_number,
            Uuid::new_v4().simple(),
            sanitize_filename(original_filename)
        )
    }

    /// 키를 content root 기준 절대 경로로 변환
    pub fn locate(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = validate_relative_key(key).map_err(StorageError::InvalidKey)?;
        Ok(self.root.join(relative))
    }

    /// 바이트 저장. 임시 파일에 쓴 뒤 rename 하므로 키에는 완성된 파일만 보입니다.
    pub async fn put(&self, key: &str, data: &[u8]) -> StorageResult<String> {
        let path = self.locate(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(key, e))?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(format!(".part-{}", Uuid::new_v4().simple()));
        let tmp_path = PathBuf::from(tmp_name);

        if let Err(e) = fs::write(&tmp_path, data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::io(key, e));
        }
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::io(key, e));
        }

        tracing::debug!("stored blob {} ({} bytes)", key, data.len());
        Ok(key.to_string())
    }

    /// 바이트 읽기
    pub async fn read(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.locate(key)?;
        let data = fs::read(&path).await.map_err(|e| StorageError::io(key, e))?;
        Ok(Bytes::from(data))
    }

    /// 삭제. 키가 없으면 성공으로 취급합니다.
    pub async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.locate(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("removed blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.locate(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io(key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_blob_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().to_path_buf());

        let key = BlobStore::chapter_key(7, 2, "Chapter Two.pdf");
        assert!(key.starts_with("chapters/group-7/chapter-2/"));
        assert!(key.ends_with("-Chapter_Two.pdf"));

        let stored = store.put(&key, b"%PDF-1.7 body").await.unwrap();
        assert_eq!(stored, key);
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.read(&key).await.unwrap().as_ref(), b"%PDF-1.7 body");

        // 임시 파일이 남지 않아야 함
        let dir = store.locate(&key).unwrap().parent().unwrap().to_path_buf();
        let entries: Vec<_> = std::fs::read_dir(dir).unwrap().collect();
        assert_eq!(entries.len(), 1);

        store.remove(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().to_path_buf());

        store.remove("chapters/group-1/chapter-1/missing.pdf").await.unwrap();
        store.remove("chapters/group-1/chapter-1/missing.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_missing_key_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().to_path_buf());

        let err = store.read("chapters/nope.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_keys_outside_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().join("root"));

        let err = store.put("../escape.pdf", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        let err = store.remove("/etc/hosts").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(!temp_dir.path().join("escape.pdf").exists());
    }

    #[tokio::test]
    async fn test_put_fails_when_root_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not-a-dir");
        std::fs::write(&root, b"occupied").unwrap();
        let store = BlobStore::new(root);

        let err = store.put("chapters/a.pdf", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
