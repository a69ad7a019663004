use std::fmt;

use thiserror::Error;

use crate::models::LifecycleState;

/// 文档处理错误类型
///
/// 所有组件都返回这一个封闭的错误类型，编排层按 [`ErrorKind`] 标签分类，
/// 不依赖继承式的异常捕获顺序。
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// 必需的配置项缺失或为空
    #[error("配置缺失: {key} ({reason})")]
    MissingConfig { key: String, reason: String },

    /// 配置文件无法解析
    #[error("配置文件无效 ({path}): {reason}")]
    InvalidConfig { path: String, reason: String },

    /// 整个扫描范围内没有任何租户拥有 Validation-Successful 文件夹
    #[error("文件夹不存在: {message}")]
    FolderMissing { message: String },

    /// Validation-Successful 文件夹存在但全部为空
    #[error("没有可处理的文档: {message}")]
    NoActionableInput { message: String },

    /// 存储容器不存在
    #[error("存储容器不存在: {container}")]
    ContainerMissing { container: String },

    /// 源对象在转移时不存在（例如已被其他运行移走）
    #[error("对象不存在: {container}/{key}")]
    BlobMissing { container: String, key: String },

    /// 无法从文件名推断文档类型，或类型没有对应的分析模型
    #[error("无法解析文档类型 ({path}): {reason}")]
    DocumentTypeUnresolved { path: String, reason: String },

    /// 目标地址已存在分析结果
    #[error("分析结果已存在，拒绝覆盖: {container}/{key}")]
    DuplicateResult { container: String, key: String },

    /// 分析服务调用失败（通用后端错误）
    #[error("Citadel 后端错误: {message}")]
    CitadelBackend { message: String },

    /// 生命周期状态只能单调前进
    #[error("非法状态转移: {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// 分析任务在超时时间内没有结束
    #[error("分析任务超时 ({elapsed_secs} 秒): {job}")]
    AnalysisTimeout { job: String, elapsed_secs: u64 },

    /// 存储 I/O 失败
    #[error("存储操作失败 ({path}): {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 生命周期存储读写失败
    #[error("生命周期存储失败 ({identifier}): {message}")]
    LifecycleStore { identifier: String, message: String },

    /// JSON 序列化/反序列化失败
    #[error("JSON 处理失败: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP 请求失败
    #[error("HTTP 请求失败 ({endpoint}): {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// 错误分类标签（扁平的处理错误族）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingConfig,
    FolderMissing,
    NoActionableInput,
    ContainerMissing,
    BlobMissing,
    DocumentTypeUnresolved,
    DuplicateResult,
    GenericProcessingError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingConfig => "MissingConfig",
            ErrorKind::FolderMissing => "FolderMissing",
            ErrorKind::NoActionableInput => "NoActionableInput",
            ErrorKind::ContainerMissing => "ContainerMissing",
            ErrorKind::BlobMissing => "BlobMissing",
            ErrorKind::DocumentTypeUnresolved => "DocumentTypeUnresolved",
            ErrorKind::DuplicateResult => "DuplicateResult",
            ErrorKind::GenericProcessingError => "GenericProcessingError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProcessingError {
    /// 获取错误的分类标签
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::MissingConfig { .. } => ErrorKind::MissingConfig,
            ProcessingError::FolderMissing { .. } => ErrorKind::FolderMissing,
            ProcessingError::NoActionableInput { .. } => ErrorKind::NoActionableInput,
            ProcessingError::ContainerMissing { .. } => ErrorKind::ContainerMissing,
            ProcessingError::BlobMissing { .. } => ErrorKind::BlobMissing,
            ProcessingError::DocumentTypeUnresolved { .. } => ErrorKind::DocumentTypeUnresolved,
            ProcessingError::DuplicateResult { .. } => ErrorKind::DuplicateResult,
            ProcessingError::InvalidConfig { .. }
            | ProcessingError::CitadelBackend { .. }
            | ProcessingError::InvalidTransition { .. }
            | ProcessingError::AnalysisTimeout { .. }
            | ProcessingError::Storage { .. }
            | ProcessingError::LifecycleStore { .. }
            | ProcessingError::Serialization(_)
            | ProcessingError::Http { .. } => ErrorKind::GenericProcessingError,
        }
    }

    /// 是否为整批致命错误（在处理任何文档之前中止运行）
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::FolderMissing | ErrorKind::NoActionableInput
        )
    }
}

// ========== 便捷构造函数 ==========

impl ProcessingError {
    /// 创建配置缺失错误
    pub fn missing_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ProcessingError::MissingConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// 创建存储 I/O 错误
    pub fn storage(path: impl Into<String>, source: std::io::Error) -> Self {
        ProcessingError::Storage {
            path: path.into(),
            source,
        }
    }

    /// 创建文档类型无法解析错误
    pub fn type_unresolved(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ProcessingError::DocumentTypeUnresolved {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 创建通用后端错误
    pub fn backend(message: impl Into<String>) -> Self {
        ProcessingError::CitadelBackend {
            message: message.into(),
        }
    }

    /// 创建生命周期存储错误
    pub fn lifecycle_store(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        ProcessingError::LifecycleStore {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// 创建 HTTP 请求错误
    pub fn http(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        ProcessingError::Http {
            endpoint: endpoint.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, ProcessingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_unclassified_variants_to_generic() {
        let err = ProcessingError::backend("服务返回错误");
        assert_eq!(err.kind(), ErrorKind::GenericProcessingError);

        let err = ProcessingError::AnalysisTimeout {
            job: "job-1".to_string(),
            elapsed_secs: 300,
        };
        assert_eq!(err.kind(), ErrorKind::GenericProcessingError);

        let err = ProcessingError::InvalidTransition {
            from: LifecycleState::Successful,
            to: LifecycleState::Failed,
        };
        assert_eq!(err.kind(), ErrorKind::GenericProcessingError);
    }

    #[test]
    fn test_only_scan_errors_are_batch_fatal() {
        let fatal = ProcessingError::FolderMissing {
            message: "没有租户".to_string(),
        };
        assert!(fatal.is_batch_fatal());

        let fatal = ProcessingError::NoActionableInput {
            message: "全部为空".to_string(),
        };
        assert!(fatal.is_batch_fatal());

        let per_document = ProcessingError::BlobMissing {
            container: "aarkglobal".to_string(),
            key: "Company-A/Inprogress/1-receipt.jpg".to_string(),
        };
        assert!(!per_document.is_batch_fatal());
        assert_eq!(per_document.kind(), ErrorKind::BlobMissing);
    }

    #[test]
    fn test_display_includes_context() {
        let err = ProcessingError::missing_config("form_recognizer_key", "值为空");
        let text = err.to_string();
        assert!(text.contains("form_recognizer_key"));
        assert!(text.contains("值为空"));
    }
}
