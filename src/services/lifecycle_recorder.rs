//! 生命周期记录服务
//!
//! 每次调用追加一条历史，先写存储再更新内存中的文档；存储失败直接向上传播。

use std::sync::Arc;

use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::LifecycleStore;
use crate::models::{Document, DocumentRecord, LifecycleEvent, LifecycleStatus};

/// 生命周期记录器
pub struct LifecycleRecorder {
    store: Arc<dyn LifecycleStore>,
}

impl LifecycleRecorder {
    pub fn new(store: Arc<dyn LifecycleStore>) -> Self {
        Self { store }
    }

    /// 追加一条生命周期事件
    pub async fn record(
        &self,
        document: &mut Document,
        status: LifecycleStatus,
        message: impl Into<String>,
    ) -> AppResult<()> {
        let event = LifecycleEvent::now(status, message);
        self.store
            .append_lifecycle_event(document.identifier(), &event)
            .await?;

        debug!("记录 {:?}: {}", event.status, event.message);
        document.push_event(event);
        Ok(())
    }

    /// 把文档的当前状态、路径和结果位置写入存储
    pub async fn sync(&self, document: &Document) -> AppResult<()> {
        self.store.upsert(&DocumentRecord::from_document(document)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::JsonFileLifecycleStore;
    use crate::models::{DocumentTypeMapping, LifecycleState};

    #[tokio::test]
    async fn test_record_appends_to_store_and_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileLifecycleStore::new(dir.path()));
        let recorder = LifecycleRecorder::new(store.clone());

        let mapping = DocumentTypeMapping::new().with("receipt", "model-receipt-v2");
        let mut document =
            Document::from_validation_path("Company-A/Validation-Successful/1-receipt.jpg", &mapping)
                .unwrap();

        recorder
            .record(&mut document, LifecycleStatus::Processing, "开始处理")
            .await
            .unwrap();
        recorder.sync(&document).await.unwrap();

        assert_eq!(document.lifecycle_history().len(), 1);

        let stored = store.find(document.identifier()).await.unwrap().unwrap();
        assert_eq!(stored.current_state, LifecycleState::ValidationSuccessful);
        assert_eq!(stored.tenant, "Company-A");
        assert_eq!(stored.lifecycle_status_list, document.lifecycle_history());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        // 用普通文件占住目录位置，写入必然失败
        let blocker = dir.path().join("store");
        std::fs::write(&blocker, b"").unwrap();
        let recorder = LifecycleRecorder::new(Arc::new(JsonFileLifecycleStore::new(&blocker)));

        let mapping = DocumentTypeMapping::new().with("receipt", "model-receipt-v2");
        let mut document =
            Document::from_validation_path("Company-A/Validation-Successful/1-receipt.jpg", &mapping)
                .unwrap();

        let result = recorder
            .record(&mut document, LifecycleStatus::Processing, "开始处理")
            .await;
        assert!(result.is_err());
        assert!(document.lifecycle_history().is_empty());
    }
}
