//! 文档定位服务
//!
//! 扫描所有租户的 `Validation-Successful` 文件夹，生成待处理文档。不修改存储。

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AppResult, ProcessingError};
use crate::infrastructure::{LifecycleStore, ObjectStore};
use crate::models::document_type::base_file_name;
use crate::models::lifecycle::{COMPANY_ROOT_FOLDER_PREFIX, VALIDATION_SUCCESSFUL_SUBFOLDER};
use crate::models::{Document, DocumentTypeMapping, LifecycleState};

/// 占位文件标记（用于让空文件夹在对象存储中保持存在）
const PLACEHOLDER_MARKER: &str = "dummy";

/// 扫描时被跳过的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 文件名解析不出已配置的文档类型
    TypeUnresolved(String),
    /// 生命周期存储中已有历史（上次移动中断，或同一路径被重新上传）
    AlreadyTracked,
    /// 生命周期记录读取失败
    RecordUnreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TypeUnresolved(reason) => write!(f, "类型无法解析: {}", reason),
            SkipReason::AlreadyTracked => write!(f, "已有处理记录"),
            SkipReason::RecordUnreadable(reason) => write!(f, "处理记录无法读取: {}", reason),
        }
    }
}

/// 留在 `Validation-Successful` 中未处理的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub key: String,
    pub reason: SkipReason,
}

/// 一次扫描的结果
#[derive(Debug, Clone, Default)]
pub struct LocatedBatch {
    /// 按发现顺序排列
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// 文档定位器
pub struct DocumentLocator {
    store: Arc<dyn ObjectStore>,
    lifecycle: Arc<dyn LifecycleStore>,
    container: String,
    mapping: DocumentTypeMapping,
}

impl DocumentLocator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        lifecycle: Arc<dyn LifecycleStore>,
        container: impl Into<String>,
        mapping: DocumentTypeMapping,
    ) -> Self {
        Self {
            store,
            lifecycle,
            container: container.into(),
            mapping,
        }
    }

    /// 扫描容器，返回待处理文档和被跳过的文件
    ///
    /// - 没有任何租户拥有 `Validation-Successful` 文件夹：`FolderMissing`
    /// - 文件夹都存在但全部为空：`NoActionableInput`
    /// - 单个文件的问题（类型无法解析、已有记录、记录损坏）：跳过并警告，只有列举失败才返回错误
    pub async fn locate(&self) -> AppResult<LocatedBatch> {
        if !self.store.container_exists(&self.container).await? {
            return Err(ProcessingError::FolderMissing {
                message: format!("存储容器 {} 不存在", self.container),
            });
        }

        let validation_folder = LifecycleState::ValidationSuccessful.folder_name();
        let mut tenants_with_folder = 0;
        let mut tenants_with_files = 0;
        let mut seen = HashSet::new();
        let mut batch = LocatedBatch::default();

        for tenant in self.store.list_folders(&self.container, "").await? {
            if !tenant.starts_with(COMPANY_ROOT_FOLDER_PREFIX) {
                warn!("跳过非租户文件夹: {}", tenant);
                continue;
            }

            let subfolders = self.store.list_folders(&self.container, &tenant).await?;
            if !subfolders.iter().any(|f| f == validation_folder) {
                info!("租户 {} 没有 {} 文件夹", tenant, validation_folder);
                continue;
            }
            tenants_with_folder += 1;

            let prefix = format!("{}{}/", tenant, VALIDATION_SUCCESSFUL_SUBFOLDER);
            let keys: Vec<String> = self
                .store
                .list_objects(&self.container, &prefix)
                .await?
                .into_iter()
                .filter(|key| !is_placeholder(key))
                .collect();

            if keys.is_empty() {
                info!("租户 {} 的 {} 文件夹为空", tenant, validation_folder);
                continue;
            }
            tenants_with_files += 1;
            debug!("租户 {}: {} 个文件", tenant, keys.len());

            for key in keys {
                if !seen.insert(key.clone()) {
                    continue;
                }

                match self.inspect(&key).await {
                    Ok(document) => batch.documents.push(document),
                    Err(reason) => {
                        warn!("跳过文件 {}: {}", key, reason);
                        batch.skipped.push(SkippedFile { key, reason });
                    }
                }
            }
        }

        if tenants_with_folder == 0 {
            return Err(ProcessingError::FolderMissing {
                message: format!(
                    "容器 {} 中没有任何 {}* 租户拥有 {} 文件夹",
                    self.container, COMPANY_ROOT_FOLDER_PREFIX, validation_folder
                ),
            });
        }
        if tenants_with_files == 0 {
            return Err(ProcessingError::NoActionableInput {
                message: format!("所有 {} 文件夹都为空", validation_folder),
            });
        }

        info!(
            "✓ 找到 {} 个待处理文档，跳过 {} 个",
            batch.documents.len(),
            batch.skipped.len()
        );
        Ok(batch)
    }

    /// 检查单个文件能否进入流水线
    ///
    /// 生命周期存储中已有历史说明该文档已进入过流水线；记录读不出来时同样不处理，
    /// 避免重复分析。
    async fn inspect(&self, key: &str) -> Result<Document, SkipReason> {
        let document = Document::from_validation_path(key, &self.mapping)
            .map_err(|e| SkipReason::TypeUnresolved(e.to_string()))?;

        match self.lifecycle.find(key).await {
            Ok(Some(record)) if !record.lifecycle_status_list.is_empty() => {
                Err(SkipReason::AlreadyTracked)
            }
            Ok(_) => Ok(document),
            Err(e) => Err(SkipReason::RecordUnreadable(e.to_string())),
        }
    }
}

fn is_placeholder(key: &str) -> bool {
    base_file_name(key)
        .to_ascii_lowercase()
        .contains(PLACEHOLDER_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::infrastructure::{JsonFileLifecycleStore, LocalFileStore};
    use crate::models::{LifecycleEvent, LifecycleStatus};

    const CONTAINER: &str = "aarkglobal";

    struct Fixture {
        _dir: tempfile::TempDir,
        lifecycle: Arc<JsonFileLifecycleStore>,
        locator: DocumentLocator,
    }

    fn fixture(files: &[&str], folders: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(CONTAINER);
        std::fs::create_dir_all(&root).unwrap();
        for folder in folders {
            std::fs::create_dir_all(root.join(folder)).unwrap();
        }
        for file in files {
            let path = root.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"data").unwrap();
        }

        let store = Arc::new(LocalFileStore::new(dir.path(), "secret"));
        let lifecycle = Arc::new(JsonFileLifecycleStore::new(dir.path().join("records")));
        let mapping = DocumentTypeMapping::new()
            .with("receipt", "model-receipt-v2")
            .with("invoice", "prebuilt-invoice");
        let locator = DocumentLocator::new(store, lifecycle.clone(), CONTAINER, mapping);
        Fixture {
            _dir: dir,
            lifecycle,
            locator,
        }
    }

    fn identifiers(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.identifier()).collect()
    }

    #[tokio::test]
    async fn test_locate_across_tenants() {
        let f = fixture(
            &[
                "Company-A/Validation-Successful/1-receipt.jpg",
                "Company-A/Validation-Successful/2-INVOICE.pdf",
                "Company-A/Successful/0-receipt.jpg",
                "Company-B/Validation-Successful/3-receipt.png",
                "Archive/Validation-Successful/4-receipt.jpg",
            ],
            &[],
        );

        let batch = f.locator.locate().await.unwrap();
        let documents = batch.documents;
        assert!(batch.skipped.is_empty());
        assert_eq!(
            identifiers(&documents),
            vec![
                "Company-A/Validation-Successful/1-receipt.jpg",
                "Company-A/Validation-Successful/2-INVOICE.pdf",
                "Company-B/Validation-Successful/3-receipt.png",
            ]
        );
        assert_eq!(documents[1].analysis_model_id(), "prebuilt-invoice");
        assert!(documents
            .iter()
            .all(|d| d.current_state() == LifecycleState::ValidationSuccessful));
    }

    #[tokio::test]
    async fn test_unresolvable_and_placeholder_files_are_skipped() {
        let f = fixture(
            &[
                "Company-A/Validation-Successful/invoice_no_hyphen.jpg",
                "Company-A/Validation-Successful/5-contract.pdf",
                "Company-A/Validation-Successful/Dummy.txt",
                "Company-A/Validation-Successful/6-receipt.jpg",
            ],
            &[],
        );

        let batch = f.locator.locate().await.unwrap();
        assert_eq!(
            identifiers(&batch.documents),
            vec!["Company-A/Validation-Successful/6-receipt.jpg"]
        );
        // 占位文件不算跳过
        assert_eq!(batch.skipped.len(), 2);
        assert!(batch
            .skipped
            .iter()
            .all(|s| matches!(s.reason, SkipReason::TypeUnresolved(_))));
    }

    #[tokio::test]
    async fn test_no_validation_folder_anywhere_is_folder_missing() {
        let f = fixture(&["Company-A/Successful/1-receipt.jpg"], &["Company-B"]);
        let err = f.locator.locate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FolderMissing);
        assert!(err.is_batch_fatal());
    }

    #[tokio::test]
    async fn test_all_empty_is_no_actionable_input() {
        let f = fixture(
            &["Company-B/Validation-Successful/dummy.keep"],
            &["Company-A/Validation-Successful"],
        );
        let err = f.locator.locate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActionableInput);
    }

    #[tokio::test]
    async fn test_tenant_without_folder_is_not_fatal() {
        let f = fixture(
            &["Company-B/Validation-Successful/1-receipt.jpg"],
            &["Company-A/Inprogress"],
        );
        let batch = f.locator.locate().await.unwrap();
        assert_eq!(batch.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_documents_with_history_are_not_located_again() {
        let f = fixture(
            &[
                "Company-A/Validation-Successful/1-receipt.jpg",
                "Company-A/Validation-Successful/2-receipt.jpg",
            ],
            &[],
        );
        f.lifecycle
            .append_lifecycle_event(
                "Company-A/Validation-Successful/1-receipt.jpg",
                &LifecycleEvent::now(LifecycleStatus::Processing, "开始处理"),
            )
            .await
            .unwrap();

        let batch = f.locator.locate().await.unwrap();
        assert_eq!(
            identifiers(&batch.documents),
            vec!["Company-A/Validation-Successful/2-receipt.jpg"]
        );
        assert_eq!(
            batch.skipped,
            vec![SkippedFile {
                key: "Company-A/Validation-Successful/1-receipt.jpg".to_string(),
                reason: SkipReason::AlreadyTracked,
            }]
        );
    }

    #[tokio::test]
    async fn test_unreadable_record_only_skips_its_file() {
        let f = fixture(
            &[
                "Company-A/Validation-Successful/1-receipt.jpg",
                "Company-A/Validation-Successful/2-receipt.jpg",
            ],
            &[],
        );
        let key = "Company-A/Validation-Successful/1-receipt.jpg";
        f.lifecycle
            .append_lifecycle_event(key, &LifecycleEvent::now(LifecycleStatus::Processing, "开始处理"))
            .await
            .unwrap();
        // 覆盖成损坏的 JSON
        let record_file = std::fs::read_dir(f.lifecycle.dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .find(|path| path.extension().map_or(false, |ext| ext == "json"))
            .unwrap();
        std::fs::write(record_file, "{not json").unwrap();

        let batch = f.locator.locate().await.unwrap();
        assert_eq!(
            identifiers(&batch.documents),
            vec!["Company-A/Validation-Successful/2-receipt.jpg"]
        );
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].key, key);
        assert!(matches!(
            batch.skipped[0].reason,
            SkipReason::RecordUnreadable(_)
        ));
    }
}
