//! 状态转移服务
//!
//! 把文档的存储对象从一个生命周期文件夹移动到另一个（先复制后删除），
//! 进入 `InProgress` 时签发新的限时只读访问凭证。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AppResult, ProcessingError};
use crate::infrastructure::ObjectStore;
use crate::models::{BlobMetadata, Document, LifecycleState};

/// 访问凭证有效期
pub const ACCESS_REFERENCE_TTL: Duration = Duration::from_secs(60 * 60);

/// 状态转移管理器
pub struct StateTransitionManager {
    store: Arc<dyn ObjectStore>,
    container: String,
}

impl StateTransitionManager {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    /// 把文档转移到目标状态
    ///
    /// 成功后文档的状态、元数据快照和访问凭证都已更新。
    ///
    /// 移动完成之前失败时文档状态不变；移动完成后读取元数据或签发凭证失败时，
    /// 文档状态已是目标状态（与对象所在位置一致），但缺少对应的快照或凭证。
    pub async fn transition(&self, document: &mut Document, target: LifecycleState) -> AppResult<()> {
        let from = document.current_state();
        if !from.can_transition_to(target) {
            return Err(ProcessingError::InvalidTransition { from, to: target });
        }

        if !self.store.container_exists(&self.container).await? {
            return Err(ProcessingError::ContainerMissing {
                container: self.container.clone(),
            });
        }

        let source = document.current_path();
        let destination = document.path_for(target);

        if !self.store.exists(&self.container, &source).await? {
            return Err(ProcessingError::BlobMissing {
                container: self.container.clone(),
                key: source,
            });
        }

        self.store
            .copy_object(&self.container, &source, &destination)
            .await?;

        if let Err(e) = self.store.delete_object(&self.container, &source).await {
            // 源对象删不掉时撤销复制，保证只有一份
            if let Err(rollback) = self.store.delete_object(&self.container, &destination).await {
                warn!(
                    "撤销复制失败，{} 与 {} 同时存在: {}",
                    source, destination, rollback
                );
            }
            return Err(e);
        }

        document.set_state(target);
        debug!("已移动: {} -> {}", source, destination);

        let properties = self
            .store
            .object_properties(&self.container, &destination)
            .await?;
        document.push_metadata(BlobMetadata {
            status: target,
            properties,
        });

        let reference = if target == LifecycleState::InProgress {
            Some(
                self.store
                    .generate_access_reference(&self.container, &destination, ACCESS_REFERENCE_TTL)
                    .await?,
            )
        } else {
            None
        };
        document.set_access_reference(reference);

        info!("状态转移 {} -> {}: {}", from, target, destination);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::infrastructure::LocalFileStore;
    use crate::models::{AccessReference, DocumentTypeMapping, ObjectProperties};
    use async_trait::async_trait;
    use chrono::Utc;

    const CONTAINER: &str = "aarkglobal";
    const KEY: &str = "Company-A/Validation-Successful/1-receipt.jpg";

    /// 无法读取元数据的存储
    struct NoProperties {
        inner: Arc<LocalFileStore>,
    }

    #[async_trait]
    impl ObjectStore for NoProperties {
        async fn container_exists(&self, container: &str) -> AppResult<bool> {
            self.inner.container_exists(container).await
        }

        async fn list_folders(&self, container: &str, prefix: &str) -> AppResult<Vec<String>> {
            self.inner.list_folders(container, prefix).await
        }

        async fn list_objects(&self, container: &str, prefix: &str) -> AppResult<Vec<String>> {
            self.inner.list_objects(container, prefix).await
        }

        async fn exists(&self, container: &str, key: &str) -> AppResult<bool> {
            self.inner.exists(container, key).await
        }

        async fn copy_object(&self, container: &str, source: &str, destination: &str) -> AppResult<()> {
            self.inner.copy_object(container, source, destination).await
        }

        async fn delete_object(&self, container: &str, key: &str) -> AppResult<()> {
            self.inner.delete_object(container, key).await
        }

        async fn object_properties(&self, _container: &str, key: &str) -> AppResult<ObjectProperties> {
            Err(ProcessingError::storage(
                key,
                std::io::Error::new(std::io::ErrorKind::Other, "元数据不可用"),
            ))
        }

        async fn get_object(&self, container: &str, key: &str) -> AppResult<Vec<u8>> {
            self.inner.get_object(container, key).await
        }

        async fn put_object_if_absent(&self, container: &str, key: &str, bytes: &[u8]) -> AppResult<()> {
            self.inner.put_object_if_absent(container, key, bytes).await
        }

        async fn generate_access_reference(
            &self,
            container: &str,
            key: &str,
            ttl: Duration,
        ) -> AppResult<AccessReference> {
            self.inner.generate_access_reference(container, key, ttl).await
        }
    }

    fn setup() -> (tempfile::TempDir, Arc<LocalFileStore>, StateTransitionManager, Document) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONTAINER).join(KEY);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"receipt").unwrap();

        let store = Arc::new(LocalFileStore::new(dir.path(), "secret"));
        let manager = StateTransitionManager::new(store.clone(), CONTAINER);
        let mapping = DocumentTypeMapping::new().with("receipt", "model-receipt-v2");
        let document = Document::from_validation_path(KEY, &mapping).unwrap();
        (dir, store, manager, document)
    }

    #[tokio::test]
    async fn test_move_to_in_progress_issues_access_reference() {
        let (_dir, store, manager, mut document) = setup();

        manager
            .transition(&mut document, LifecycleState::InProgress)
            .await
            .unwrap();

        assert_eq!(document.current_state(), LifecycleState::InProgress);
        assert!(!store.exists(CONTAINER, KEY).await.unwrap());
        assert!(store
            .exists(CONTAINER, "Company-A/Inprogress/1-receipt.jpg")
            .await
            .unwrap());

        let reference = document.access_reference().unwrap();
        assert_eq!(reference.permissions, "r");
        assert!(reference.is_valid_at(Utc::now()));
        assert!(!reference.is_valid_at(Utc::now() + chrono::Duration::minutes(61)));

        let snapshot = &document.metadata_snapshots()[0];
        assert_eq!(snapshot.status, LifecycleState::InProgress);
        assert_eq!(snapshot.properties.content_length, 7);
    }

    #[tokio::test]
    async fn test_terminal_move_clears_access_reference() {
        let (_dir, store, manager, mut document) = setup();

        manager.transition(&mut document, LifecycleState::InProgress).await.unwrap();
        manager.transition(&mut document, LifecycleState::Successful).await.unwrap();

        assert!(document.access_reference().is_none());
        assert_eq!(document.metadata_snapshots().len(), 2);
        assert!(store
            .exists(CONTAINER, "Company-A/Successful/1-receipt.jpg")
            .await
            .unwrap());
        assert_eq!(
            store.list_objects(CONTAINER, "Company-A").await.unwrap(),
            vec!["Company-A/Successful/1-receipt.jpg".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rejects_backward_and_terminal_transitions() {
        let (_dir, _store, manager, mut document) = setup();

        let err = manager
            .transition(&mut document, LifecycleState::Successful)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidTransition { .. }));

        manager.transition(&mut document, LifecycleState::Failed).await.unwrap();
        let err = manager
            .transition(&mut document, LifecycleState::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidTransition { .. }));
        assert_eq!(document.current_state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn test_missing_source_is_blob_missing() {
        let (dir, _store, manager, mut document) = setup();
        std::fs::remove_file(dir.path().join(CONTAINER).join(KEY)).unwrap();

        let err = manager
            .transition(&mut document, LifecycleState::InProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BlobMissing);
        assert_eq!(document.current_state(), LifecycleState::ValidationSuccessful);
    }

    #[tokio::test]
    async fn test_missing_container_is_container_missing() {
        let (_dir, store, _manager, mut document) = setup();
        let manager = StateTransitionManager::new(store, "other-container");

        let err = manager
            .transition(&mut document, LifecycleState::InProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContainerMissing);
    }

    #[tokio::test]
    async fn test_failure_after_move_keeps_state_in_step_with_object() {
        let (_dir, store, _manager, mut document) = setup();
        let manager = StateTransitionManager::new(
            Arc::new(NoProperties {
                inner: store.clone(),
            }),
            CONTAINER,
        );

        let err = manager
            .transition(&mut document, LifecycleState::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Storage { .. }));

        // 对象已经移动，文档状态跟随对象
        assert!(!store.exists(CONTAINER, KEY).await.unwrap());
        assert_eq!(document.current_state(), LifecycleState::InProgress);
        assert!(document.metadata_snapshots().is_empty());
        assert!(document.access_reference().is_none());
    }
}
