//! 元数据存储中的文档记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::document::{Document, ResultLocation};
use crate::models::lifecycle::{LifecycleEvent, LifecycleState};

/// 持久化的文档记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub identifier: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub analysis_model_id: String,
    pub current_state: LifecycleState,
    #[serde(default)]
    pub validation_successful_path: String,
    #[serde(default)]
    pub in_progress_path: Option<String>,
    #[serde(default)]
    pub terminal_path: Option<String>,
    #[serde(default)]
    pub result_location: Option<ResultLocation>,
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default)]
    pub is_processed_success: bool,
    #[serde(default)]
    pub is_processed_failed: bool,
    #[serde(default)]
    pub lifecycle_status_list: Vec<LifecycleEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// 只有标识的最小记录（在未知标识上追加历史时使用）
    pub fn placeholder(identifier: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            identifier: identifier.into(),
            tenant: String::new(),
            document_type: String::new(),
            analysis_model_id: String::new(),
            current_state: LifecycleState::ValidationSuccessful,
            validation_successful_path: String::new(),
            in_progress_path: None,
            terminal_path: None,
            result_location: None,
            is_processing: false,
            is_processed_success: false,
            is_processed_failed: false,
            lifecycle_status_list: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 从文档当前状态生成记录快照
    pub fn from_document(document: &Document) -> Self {
        let state = document.current_state();
        let now = Utc::now();
        // 每次转移都会留下一份元数据快照
        let reached_in_progress = document
            .metadata_snapshots()
            .iter()
            .any(|m| m.status == LifecycleState::InProgress);

        Self {
            identifier: document.identifier().to_string(),
            tenant: document.tenant().to_string(),
            document_type: document.document_type().to_string(),
            analysis_model_id: document.analysis_model_id().to_string(),
            current_state: state,
            validation_successful_path: document.path_for(LifecycleState::ValidationSuccessful),
            in_progress_path: reached_in_progress
                .then(|| document.path_for(LifecycleState::InProgress)),
            terminal_path: state.is_terminal().then(|| document.current_path()),
            result_location: document.result_location().cloned(),
            is_processing: state == LifecycleState::InProgress,
            is_processed_success: state == LifecycleState::Successful,
            is_processed_failed: state == LifecycleState::Failed,
            lifecycle_status_list: document.lifecycle_history().to_vec(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 记录查询条件
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub state: Option<LifecycleState>,
    pub tenant: Option<String>,
}

impl RecordFilter {
    pub fn by_state(state: LifecycleState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &DocumentRecord) -> bool {
        self.state.map_or(true, |state| record.current_state == state)
            && self
                .tenant
                .as_deref()
                .map_or(true, |tenant| record.tenant == tenant)
    }
}
