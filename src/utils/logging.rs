/// 日志工具模块
///
/// 提供日志初始化、日志文件头和运行统计输出的辅助函数
use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{AppResult, ProcessingError};

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先；否则默认 `citadel_idp=info`，详细模式为 `debug`。重复调用无副作用。
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "citadel_idp=debug"
    } else {
        "citadel_idp=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径（父目录不存在时自动创建）
pub fn init_log_file(log_file_path: &Path) -> AppResult<()> {
    if let Some(parent) = log_file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ProcessingError::storage(parent.display().to_string(), e))?;
    }

    let log_header = format!(
        "{}\n文档处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    std::fs::write(log_file_path, log_header)
        .map_err(|e| ProcessingError::storage(log_file_path.display().to_string(), e))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 文档生命周期处理 ({})", config.main.env);
    info!(
        "📦 存储: {} / 容器 {}",
        config.main.storage_root.display(),
        config.main.blob_container
    );
    info!("📋 已配置 {} 种文档类型", config.document_types.len());
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("分析服务返回错误信息", 4), "分析服务...");
    }

    #[test]
    fn test_init_log_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("citadel-idp-backend.log");

        init_log_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("文档处理日志"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init(false);
        init(true);
    }
}
