//! 对象存储 - 基础设施层
//!
//! 只暴露"存储对象"的能力：列举、复制、删除、读元数据、写入、生成限时访问凭证。
//! 不认识租户、生命周期文件夹或文档类型。

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppResult, ProcessingError};
use crate::models::{AccessReference, ObjectProperties};

/// 只读权限标记
pub const READ_PERMISSION: &str = "r";

/// 对象存储能力
///
/// 键统一使用 `/` 分隔。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 容器是否存在
    async fn container_exists(&self, container: &str) -> AppResult<bool>;

    /// 列出 `prefix` 下一级的文件夹名（`prefix` 为空时列出顶层）
    async fn list_folders(&self, container: &str, prefix: &str) -> AppResult<Vec<String>>;

    /// 递归列出 `prefix` 下所有对象的完整键，按字典序排序
    async fn list_objects(&self, container: &str, prefix: &str) -> AppResult<Vec<String>>;

    /// 对象是否存在
    async fn exists(&self, container: &str, key: &str) -> AppResult<bool>;

    async fn copy_object(&self, container: &str, source: &str, destination: &str) -> AppResult<()>;

    async fn delete_object(&self, container: &str, key: &str) -> AppResult<()>;

    async fn object_properties(&self, container: &str, key: &str) -> AppResult<ObjectProperties>;

    /// 读取对象内容
    async fn get_object(&self, container: &str, key: &str) -> AppResult<Vec<u8>>;

    /// 写入新对象；目标已存在时返回 `DuplicateResult`，不会覆盖
    async fn put_object_if_absent(&self, container: &str, key: &str, bytes: &[u8]) -> AppResult<()>;

    /// 生成限时只读访问凭证
    async fn generate_access_reference(
        &self,
        container: &str,
        key: &str,
        ttl: Duration,
    ) -> AppResult<AccessReference>;
}

/// 本地文件系统实现：`<root>/<container>/<key>`
pub struct LocalFileStore {
    root: PathBuf,
    secret: String,
}

impl LocalFileStore {
    /// 创建新的本地存储
    pub fn new(root: impl Into<PathBuf>, secret: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            secret: secret.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        self.root.join(container)
    }

    /// 拒绝包含 `..` 等越界成分的键
    fn object_path(&self, container: &str, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(ProcessingError::storage(
                key,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "非法的对象键"),
            ));
        }
        Ok(self.container_dir(container).join(relative))
    }

    async fn ensure_container(&self, container: &str) -> AppResult<()> {
        if self.container_exists(container).await? {
            Ok(())
        } else {
            Err(ProcessingError::ContainerMissing {
                container: container.to_string(),
            })
        }
    }

    /// 访问凭证签名：sha256(容器, 键, 权限, 过期时间, 密钥)
    fn sign(&self, container: &str, key: &str, expiry: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [container, key, READ_PERMISSION, expiry, self.secret.as_str()] {
            hasher.update(part.as_bytes());
            hasher.update(b"\n");
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[async_trait]
impl ObjectStore for LocalFileStore {
    async fn container_exists(&self, container: &str) -> AppResult<bool> {
        Ok(fs::metadata(self.container_dir(container))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn list_folders(&self, container: &str, prefix: &str) -> AppResult<Vec<String>> {
        self.ensure_container(container).await?;

        let dir = if prefix.is_empty() {
            self.container_dir(container)
        } else {
            self.object_path(container, prefix)?
        };

        let mut folders = Vec::new();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(folders),
            Err(e) => return Err(ProcessingError::storage(dir.display().to_string(), e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProcessingError::storage(dir.display().to_string(), e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                folders.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        folders.sort();
        Ok(folders)
    }

    async fn list_objects(&self, container: &str, prefix: &str) -> AppResult<Vec<String>> {
        self.ensure_container(container).await?;

        let container_dir = self.container_dir(container);
        let start = if prefix.is_empty() {
            container_dir.clone()
        } else {
            self.object_path(container, prefix.trim_end_matches('/'))?
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ProcessingError::storage(dir.display().to_string(), e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ProcessingError::storage(dir.display().to_string(), e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| ProcessingError::storage(path.display().to_string(), e))?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&container_dir) {
                        keys.push(to_key(relative));
                    }
                }
            }
        }

        keys.sort();
        debug!("列出对象 {}/{}: {} 个", container, prefix, keys.len());
        Ok(keys)
    }

    async fn exists(&self, container: &str, key: &str) -> AppResult<bool> {
        self.ensure_container(container).await?;
        let path = self.object_path(container, key)?;
        Ok(fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false))
    }

    async fn copy_object(&self, container: &str, source: &str, destination: &str) -> AppResult<()> {
        if !self.exists(container, source).await? {
            return Err(ProcessingError::BlobMissing {
                container: container.to_string(),
                key: source.to_string(),
            });
        }

        let from = self.object_path(container, source)?;
        let to = self.object_path(container, destination)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ProcessingError::storage(parent.display().to_string(), e))?;
        }

        fs::copy(&from, &to)
            .await
            .map_err(|e| ProcessingError::storage(destination, e))?;
        debug!("复制对象 {} -> {}", source, destination);
        Ok(())
    }

    async fn delete_object(&self, container: &str, key: &str) -> AppResult<()> {
        self.ensure_container(container).await?;
        let path = self.object_path(container, key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ProcessingError::BlobMissing {
                container: container.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(ProcessingError::storage(key, e)),
        }
    }

    async fn object_properties(&self, container: &str, key: &str) -> AppResult<ObjectProperties> {
        self.ensure_container(container).await?;
        let path = self.object_path(container, key)?;

        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            _ => {
                return Err(ProcessingError::BlobMissing {
                    container: container.to_string(),
                    key: key.to_string(),
                })
            }
        };
        let bytes = fs::read(&path)
            .await
            .map_err(|e| ProcessingError::storage(key, e))?;
        let digest = md5::compute(&bytes);

        Ok(ObjectProperties {
            name: key.to_string(),
            url: file_url(&path),
            container: container.to_string(),
            content_length: metadata.len(),
            content_md5: base64::engine::general_purpose::STANDARD.encode(digest.0),
            content_type: content_type_for(key).to_string(),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn get_object(&self, container: &str, key: &str) -> AppResult<Vec<u8>> {
        self.ensure_container(container).await?;
        let path = self.object_path(container, key)?;

        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ProcessingError::BlobMissing {
                container: container.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(ProcessingError::storage(key, e)),
        }
    }

    async fn put_object_if_absent(&self, container: &str, key: &str, bytes: &[u8]) -> AppResult<()> {
        let path = self.object_path(container, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ProcessingError::storage(parent.display().to_string(), e))?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ProcessingError::DuplicateResult {
                    container: container.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(ProcessingError::storage(key, e)),
        };

        file.write_all(bytes)
            .await
            .map_err(|e| ProcessingError::storage(key, e))?;
        file.flush()
            .await
            .map_err(|e| ProcessingError::storage(key, e))?;
        Ok(())
    }

    async fn generate_access_reference(
        &self,
        container: &str,
        key: &str,
        ttl: Duration,
    ) -> AppResult<AccessReference> {
        if !self.exists(container, key).await? {
            return Err(ProcessingError::BlobMissing {
                container: container.to_string(),
                key: key.to_string(),
            });
        }

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ProcessingError::backend(format!("无效的凭证有效期: {}", e)))?;
        let expires_at = Utc::now() + ttl;
        let expiry = expires_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let signature = self.sign(container, key, &expiry);
        let path = self.object_path(container, key)?;

        Ok(AccessReference {
            url: format!(
                "{}?sp={}&se={}&sig={}",
                file_url(&path),
                READ_PERMISSION,
                expiry,
                signature
            ),
            permissions: READ_PERMISSION.to_string(),
            expires_at,
        })
    }
}

fn to_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_url(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    format!("file://{}", absolute.to_string_lossy().replace('\\', "/"))
}

/// 根据扩展名推断内容类型
fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
