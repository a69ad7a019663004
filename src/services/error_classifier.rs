//! 错误分类服务
//!
//! 把单个文档处理中出现的错误归入五个固定类别。分类只影响日志内容，
//! 不影响结果：所有分类后的失败都进入 `Failed`。

use std::fmt;

use crate::error::{ErrorKind, ProcessingError};
use crate::models::LifecycleState;

/// 单文档失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    MissingConfig,
    ContainerMissing,
    BlobMissing,
    DocumentTypeUnresolved,
    GenericProcessingError,
}

impl ErrorClass {
    pub fn classify(error: &ProcessingError) -> Self {
        match error.kind() {
            ErrorKind::MissingConfig => ErrorClass::MissingConfig,
            ErrorKind::ContainerMissing => ErrorClass::ContainerMissing,
            ErrorKind::BlobMissing => ErrorClass::BlobMissing,
            ErrorKind::DocumentTypeUnresolved => ErrorClass::DocumentTypeUnresolved,
            ErrorKind::DuplicateResult
            | ErrorKind::FolderMissing
            | ErrorKind::NoActionableInput
            | ErrorKind::GenericProcessingError => ErrorClass::GenericProcessingError,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::MissingConfig => "MissingConfig",
            ErrorClass::ContainerMissing => "ContainerMissing",
            ErrorClass::BlobMissing => "BlobMissing",
            ErrorClass::DocumentTypeUnresolved => "DocumentTypeUnresolved",
            ErrorClass::GenericProcessingError => "GenericProcessingError",
        }
    }

    /// 写入生命周期历史的失败说明
    pub fn failure_message(self, error: &ProcessingError) -> String {
        let hint = match self {
            ErrorClass::MissingConfig => "分析服务凭证或地址未配置",
            ErrorClass::ContainerMissing => "存储容器不存在",
            ErrorClass::BlobMissing => "源文件已不存在",
            ErrorClass::DocumentTypeUnresolved => "无法确定文档类型",
            ErrorClass::GenericProcessingError => "处理失败",
        };
        format!("[{}] {}: {}", self, hint, error)
    }

    /// 分类后的目标状态（始终为 `Failed`）
    pub fn terminal_state(self) -> LifecycleState {
        LifecycleState::Failed
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_taxonomy() {
        let cases = [
            (ProcessingError::missing_config("main.form_recognizer_key", "值为空"), ErrorClass::MissingConfig),
            (
                ProcessingError::ContainerMissing { container: "aarkglobal".to_string() },
                ErrorClass::ContainerMissing,
            ),
            (
                ProcessingError::BlobMissing {
                    container: "aarkglobal".to_string(),
                    key: "Company-A/Inprogress/1-receipt.jpg".to_string(),
                },
                ErrorClass::BlobMissing,
            ),
            (ProcessingError::type_unresolved("x.jpg", "缺少 '-'"), ErrorClass::DocumentTypeUnresolved),
            (ProcessingError::backend("服务返回错误"), ErrorClass::GenericProcessingError),
            (
                ProcessingError::DuplicateResult {
                    container: "bloboutputcontainer".to_string(),
                    key: "Company-A/1-receipt.jpg.json".to_string(),
                },
                ErrorClass::GenericProcessingError,
            ),
        ];

        for (error, expected) in cases {
            let class = ErrorClass::classify(&error);
            assert_eq!(class, expected, "{}", error);
            assert_eq!(class.terminal_state(), LifecycleState::Failed);
        }
    }

    #[test]
    fn test_failure_message_names_class() {
        let error = ProcessingError::backend("访问凭证为空");
        let class = ErrorClass::classify(&error);
        let message = class.failure_message(&error);
        assert!(message.starts_with("[GenericProcessingError]"));
        assert!(message.contains("访问凭证为空"));
    }
}
