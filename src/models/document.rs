//! 文档实体
//!
//! 状态是显式的枚举字段；存储路径由 (租户, 状态, 相对名) 推导得出，不是事实来源。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{AppResult, ProcessingError};
use crate::models::document_type::{base_file_name, resolve_document_type, DocumentTypeMapping};
use crate::models::lifecycle::{LifecycleEvent, LifecycleState, COMPANY_ROOT_FOLDER_PREFIX};

/// 限时访问凭证（只读）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessReference {
    pub url: String,
    pub permissions: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessReference {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.url.is_empty() && now < self.expires_at
    }
}

/// 存储对象属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperties {
    pub name: String,
    pub url: String,
    pub container: String,
    pub content_length: u64,
    /// MD5 摘要的 base64 编码
    pub content_md5: String,
    pub content_type: String,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// 对象存储元数据快照（用于审计）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// 快照时文档所处状态
    pub status: LifecycleState,
    #[serde(flatten)]
    pub properties: ObjectProperties,
}

/// 分析结果的存放位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLocation {
    pub container: String,
    pub key: String,
}

/// 文档：处理的基本单元
#[derive(Debug, Clone)]
pub struct Document {
    identifier: String,
    tenant: String,
    /// Validation-Successful 文件夹下的相对路径
    relative_name: String,
    document_type: String,
    analysis_model_id: String,
    current_state: LifecycleState,
    access_reference: Option<AccessReference>,
    analysis_result: Option<JsonValue>,
    result_location: Option<ResultLocation>,
    lifecycle_history: Vec<LifecycleEvent>,
    metadata_snapshots: Vec<BlobMetadata>,
}

impl Document {
    /// 由一个明确的 Validation-Successful 路径构造文档
    ///
    /// 文档类型无法解析时直接失败（硬性前置条件）。
    pub fn from_validation_path(key: &str, mapping: &DocumentTypeMapping) -> AppResult<Self> {
        let (tenant, relative_name) = split_validation_key(key)?;
        let (document_type, analysis_model_id) = resolve_document_type(key, mapping)?;

        Ok(Self {
            identifier: key.to_string(),
            tenant: tenant.to_string(),
            relative_name: relative_name.to_string(),
            document_type,
            analysis_model_id,
            current_state: LifecycleState::ValidationSuccessful,
            access_reference: None,
            analysis_result: None,
            result_location: None,
            lifecycle_history: Vec::new(),
            metadata_snapshots: Vec::new(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn analysis_model_id(&self) -> &str {
        &self.analysis_model_id
    }

    pub fn current_state(&self) -> LifecycleState {
        self.current_state
    }

    pub fn access_reference(&self) -> Option<&AccessReference> {
        self.access_reference.as_ref()
    }

    pub fn analysis_result(&self) -> Option<&JsonValue> {
        self.analysis_result.as_ref()
    }

    pub fn result_location(&self) -> Option<&ResultLocation> {
        self.result_location.as_ref()
    }

    pub fn lifecycle_history(&self) -> &[LifecycleEvent] {
        &self.lifecycle_history
    }

    pub fn metadata_snapshots(&self) -> &[BlobMetadata] {
        &self.metadata_snapshots
    }

    /// 基础文件名，例如 `1-receipt.jpg`
    pub fn base_name(&self) -> &str {
        base_file_name(&self.relative_name)
    }

    /// 文档在给定状态下的存储路径
    pub fn path_for(&self, state: LifecycleState) -> String {
        format!("{}{}/{}", self.tenant, state.folder_token(), self.relative_name)
    }

    pub fn current_path(&self) -> String {
        self.path_for(self.current_state)
    }

    // ========== 只允许服务层修改 ==========

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.current_state = state;
    }

    pub(crate) fn set_access_reference(&mut self, reference: Option<AccessReference>) {
        self.access_reference = reference;
    }

    pub(crate) fn set_analysis_result(&mut self, result: JsonValue, location: ResultLocation) {
        self.analysis_result = Some(result);
        self.result_location = Some(location);
    }

    pub(crate) fn push_event(&mut self, event: LifecycleEvent) {
        self.lifecycle_history.push(event);
    }

    pub(crate) fn push_metadata(&mut self, metadata: BlobMetadata) {
        self.metadata_snapshots.push(metadata);
    }
}

/// 拆分 `Company-*/Validation-Successful/<name>` 形式的路径
fn split_validation_key(key: &str) -> AppResult<(&str, &str)> {
    let mut parts = key.splitn(3, '/');
    let tenant = parts.next().unwrap_or_default();
    let folder = parts.next().unwrap_or_default();
    let relative_name = parts.next().unwrap_or_default();

    if !tenant.starts_with(COMPANY_ROOT_FOLDER_PREFIX) {
        return Err(ProcessingError::type_unresolved(
            key,
            format!("租户文件夹必须以 '{}' 开头", COMPANY_ROOT_FOLDER_PREFIX),
        ));
    }
    if LifecycleState::from_folder_name(folder) != Some(LifecycleState::ValidationSuccessful) {
        return Err(ProcessingError::type_unresolved(
            key,
            "文档不在 Validation-Successful 文件夹中",
        ));
    }
    if relative_name.is_empty() {
        return Err(ProcessingError::type_unresolved(key, "缺少文件名"));
    }

    Ok((tenant, relative_name))
}
