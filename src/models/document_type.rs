//! 文档类型解析
//!
//! 文件名约定：基础文件名（去掉扩展名）最后一个 `-` 之后的部分即为文档类型，
//! 例如 `1001-receipt.jpg` → `receipt`。类型按不区分大小写的方式映射到分析模型。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppResult, ProcessingError};

/// 文档类型 → 分析模型 映射
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct DocumentTypeMapping {
    /// 键统一存为小写
    models: BTreeMap<String, String>,
}

impl DocumentTypeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一条映射（键不区分大小写）
    pub fn insert(&mut self, document_type: impl AsRef<str>, model_id: impl Into<String>) {
        self.models
            .insert(document_type.as_ref().to_lowercase(), model_id.into());
    }

    pub fn with(mut self, document_type: impl AsRef<str>, model_id: impl Into<String>) -> Self {
        self.insert(document_type, model_id);
        self
    }

    /// 查找文档类型对应的模型
    pub fn model_for(&self, document_type: &str) -> Option<&str> {
        self.models
            .get(&document_type.to_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }
}

impl From<BTreeMap<String, String>> for DocumentTypeMapping {
    fn from(raw: BTreeMap<String, String>) -> Self {
        let mut mapping = DocumentTypeMapping::new();
        for (document_type, model_id) in raw {
            mapping.insert(document_type, model_id);
        }
        mapping
    }
}

impl From<DocumentTypeMapping> for BTreeMap<String, String> {
    fn from(mapping: DocumentTypeMapping) -> Self {
        mapping.models
    }
}

/// 取路径的基础文件名（支持 `/` 与 `\` 分隔符）
pub fn base_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// 去掉扩展名；以 `.` 开头的隐藏文件视为没有扩展名
fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(index) if index > 0 => &file_name[..index],
        _ => file_name,
    }
}

/// 从文件名或路径解析 (文档类型, 模型ID)
///
/// 纯函数：同一文件名多次解析结果一致。
///
/// # 错误
/// - 文件名中没有 `-`
/// - `-` 后为空
/// - 映射中找不到该类型
pub fn resolve_document_type(
    path: &str,
    mapping: &DocumentTypeMapping,
) -> AppResult<(String, String)> {
    let name_part = strip_extension(base_file_name(path));

    let index = name_part.rfind('-').ok_or_else(|| {
        ProcessingError::type_unresolved(path, "文件名中没有连字符 (-)")
    })?;

    let document_type = &name_part[index + 1..];
    if document_type.is_empty() {
        return Err(ProcessingError::type_unresolved(
            path,
            "连字符 (-) 之后没有文档类型",
        ));
    }

    let model_id = mapping.model_for(document_type).ok_or_else(|| {
        ProcessingError::type_unresolved(
            path,
            format!("文档类型 '{}' 没有配置对应的分析模型", document_type),
        )
    })?;

    Ok((document_type.to_string(), model_id.to_string()))
}
