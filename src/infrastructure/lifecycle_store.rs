//! 生命周期元数据存储 - 基础设施层
//!
//! 每个文档一份记录，生命周期历史只追加。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AppResult, ProcessingError};
use crate::models::{DocumentRecord, LifecycleEvent, RecordFilter};

/// 生命周期存储能力
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// 追加一条生命周期事件；标识未知时创建最小记录
    async fn append_lifecycle_event(&self, identifier: &str, event: &LifecycleEvent) -> AppResult<()>;

    /// 写入记录的标量字段；已存储的历史不会被缩短或改写
    async fn upsert(&self, record: &DocumentRecord) -> AppResult<()>;

    async fn find(&self, identifier: &str) -> AppResult<Option<DocumentRecord>>;

    async fn query(&self, filter: &RecordFilter) -> AppResult<Vec<DocumentRecord>>;
}

/// JSON 文件实现：目录下每个文档一个 `.json` 文件
pub struct JsonFileLifecycleStore {
    dir: PathBuf,
    /// 串行化本进程内的读-改-写
    write_lock: Mutex<()>,
}

impl JsonFileLifecycleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 文件名：可读前缀 + 标识哈希，避免不同标识清洗后冲突
    fn record_path(&self, identifier: &str) -> PathBuf {
        let readable: String = identifier
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        let hash = Sha256::digest(identifier.as_bytes());
        let short: String = hash.iter().take(4).map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{}-{}.json", readable, short))
    }

    async fn load(&self, identifier: &str) -> AppResult<Option<DocumentRecord>> {
        let path = self.record_path(identifier);
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let record = serde_json::from_str(&content).map_err(|e| {
                    ProcessingError::lifecycle_store(identifier, format!("记录损坏: {}", e))
                })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProcessingError::lifecycle_store(identifier, e.to_string())),
        }
    }

    /// 先写临时文件再改名，避免半写的记录
    async fn save(&self, record: &DocumentRecord) -> AppResult<()> {
        let identifier = record.identifier.as_str();
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ProcessingError::lifecycle_store(identifier, e.to_string()))?;

        let path = self.record_path(identifier);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(record)?;

        fs::write(&tmp, content)
            .await
            .map_err(|e| ProcessingError::lifecycle_store(identifier, e.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| ProcessingError::lifecycle_store(identifier, e.to_string()))?;

        debug!("保存生命周期记录: {}", identifier);
        Ok(())
    }
}

#[async_trait]
impl LifecycleStore for JsonFileLifecycleStore {
    async fn append_lifecycle_event(&self, identifier: &str, event: &LifecycleEvent) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut record = self
            .load(identifier)
            .await?
            .unwrap_or_else(|| DocumentRecord::placeholder(identifier));
        record.lifecycle_status_list.push(event.clone());
        record.updated_at = Utc::now();

        self.save(&record).await
    }

    async fn upsert(&self, record: &DocumentRecord) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut merged = record.clone();
        if let Some(existing) = self.load(&record.identifier).await? {
            merged.created_at = existing.created_at;
            if existing.lifecycle_status_list.len() > merged.lifecycle_status_list.len() {
                warn!(
                    "记录 {} 的历史比存储中的短 ({} < {})，保留已存储的历史",
                    record.identifier,
                    merged.lifecycle_status_list.len(),
                    existing.lifecycle_status_list.len()
                );
                merged.lifecycle_status_list = existing.lifecycle_status_list;
            }
        }
        merged.updated_at = Utc::now();

        self.save(&merged).await
    }

    async fn find(&self, identifier: &str) -> AppResult<Option<DocumentRecord>> {
        self.load(identifier).await
    }

    async fn query(&self, filter: &RecordFilter) -> AppResult<Vec<DocumentRecord>> {
        let mut records = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(ProcessingError::lifecycle_store("*", e.to_string())),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProcessingError::lifecycle_store("*", e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| ProcessingError::lifecycle_store("*", e.to_string()))?;
            match serde_json::from_str::<DocumentRecord>(&content) {
                Ok(record) if filter.matches(&record) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!("跳过无法解析的记录 {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(records)
    }
}
