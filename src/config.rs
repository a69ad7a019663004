//! 程序配置
//!
//! 启动时构造一次，按引用/`Arc` 传给各组件，不存在全局可变配置。
//!
//! 优先级：环境变量 > TOML 文件 > 默认值。TOML 文件中的 `${VAR}` 会先用环境变量展开。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;
use serde::Deserialize;
use crate::error::{AppResult, ProcessingError};
use crate::models::DocumentTypeMapping;

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "citadel-idp-backend.toml";

/// 程序配置文件
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub main: MainConfig,
    pub analysis: AnalysisConfig,
    /// 文档类型 → 分析模型
    pub document_types: DocumentTypeMapping,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// 运行环境
    pub env: String,
    /// 本地对象存储根目录
    pub storage_root: PathBuf,
    /// 待处理文档所在容器
    pub blob_container: String,
    /// 分析结果输出容器
    pub json_output_container: String,
    /// 生命周期记录目录
    pub lifecycle_store_dir: PathBuf,
    // --- 分析服务 ---
    pub form_recognizer_key: String,
    pub form_recognizer_endpoint: String,
    /// 访问凭证签名密钥
    pub access_reference_secret: String,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            env: "local".to_string(),
            storage_root: PathBuf::from("local-blob-storage"),
            blob_container: "aarkglobal".to_string(),
            json_output_container: "bloboutputcontainer".to_string(),
            lifecycle_store_dir: PathBuf::from("lifecycle-store"),
            form_recognizer_key: String::new(),
            form_recognizer_endpoint: String::new(),
            access_reference_secret: String::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub api_version: String,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单个分析任务超时（秒）
    pub timeout_secs: u64,
    /// 提交失败时的最大重试次数
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    /// 单次 HTTP 请求超时（秒），包括提交和每次轮询
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_version: "2023-07-31".to_string(),
            poll_interval_ms: 1000,
            timeout_secs: 300,
            max_retries: 3,
            retry_delay_ms: 2000,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 两次运行之间的间隔（秒）
    pub interval_secs: u64,
    /// 允许运行的时间窗口（本地时间，含两端）
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    /// 只运行一次后退出
    pub run_once: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            window_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            window_end: NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN),
            run_once: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 输出日志文件
    pub log_file: PathBuf,
    /// 是否显示详细日志
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("logs/citadel-idp-backend.log"),
            verbose: false,
        }
    }
}

/// 分析服务凭证
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisCredentials {
    pub key: String,
    pub endpoint: String,
}

impl Config {
    /// 只用默认值和环境变量构造配置
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// 配置文件路径：`<app_base_dir>/config-files/<env>/citadel-idp-backend.toml`
    pub fn file_path(app_base_dir: &Path, app_env: &str) -> PathBuf {
        app_base_dir
            .join("config-files")
            .join(app_env)
            .join(CONFIG_FILE_NAME)
    }

    /// 读取指定环境的配置文件
    pub async fn load(app_base_dir: &Path, app_env: &str) -> AppResult<Self> {
        let path = Self::file_path(app_base_dir, app_env);
        if !path.exists() {
            return Err(ProcessingError::missing_config(
                path.display().to_string(),
                format!("环境 '{}' 的配置文件不存在", app_env),
            ));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ProcessingError::storage(path.display().to_string(), e))?;

        let mut config = Self::from_toml_str(&content, &path.display().to_string())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// 解析 TOML 文本（先展开 `${VAR}`）
    pub fn from_toml_str(content: &str, origin: &str) -> AppResult<Self> {
        let expanded = interpolate_env(content, |name| std::env::var(name).ok());
        toml::from_str(&expanded).map_err(|e| ProcessingError::InvalidConfig {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_string("STORAGE_ROOT") {
            self.main.storage_root = PathBuf::from(v);
        }
        if let Some(v) = env_string("LIFECYCLE_STORE_DIR") {
            self.main.lifecycle_store_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("BLOB_CONTAINER") {
            self.main.blob_container = v;
        }
        if let Some(v) = env_string("JSON_OUTPUT_CONTAINER") {
            self.main.json_output_container = v;
        }
        if let Some(v) = env_string("FORM_RECOGNIZER_KEY") {
            self.main.form_recognizer_key = v;
        }
        if let Some(v) = env_string("FORM_RECOGNIZER_ENDPOINT") {
            self.main.form_recognizer_endpoint = v;
        }
        if let Some(v) = env_string("ACCESS_REFERENCE_SECRET") {
            self.main.access_reference_secret = v;
        }
        if let Some(v) = env_string("RUN_ONCE").and_then(|v| v.parse().ok()) {
            self.schedule.run_once = v;
        }
        if let Some(v) = env_string("VERBOSE_LOGGING").and_then(|v| v.parse().ok()) {
            self.logging.verbose = v;
        }
    }

    /// 分析服务的凭证与地址，缺失或为空时返回 `MissingConfig`
    pub fn analysis_credentials(&self) -> AppResult<AnalysisCredentials> {
        let key = require_non_empty("main.form_recognizer_key", &self.main.form_recognizer_key)?;
        let endpoint = require_non_empty(
            "main.form_recognizer_endpoint",
            &self.main.form_recognizer_endpoint,
        )?;
        Ok(AnalysisCredentials { key, endpoint })
    }
}

fn require_non_empty(key: &str, value: &str) -> AppResult<String> {
    let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
    if value.is_empty() {
        return Err(ProcessingError::missing_config(key, "未配置或值为空"));
    }
    Ok(value.to_string())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("静态正则表达式")
    })
}

/// 展开 `${VAR}`，未定义的变量展开为空字符串
pub fn interpolate_env(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    env_reference_pattern()
        .replace_all(content, |caps: &regex::Captures| {
            lookup(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SAMPLE: &str = r#"
[main]
env = "local"
storage_root = "/data/blobs"
form_recognizer_key = "${TEST_FR_KEY}"
form_recognizer_endpoint = "https://example.cognitiveservices.azure.com/"

[analysis]
poll_interval_ms = 50

[document_types]
Receipt = "model-receipt-v2"
invoice = "prebuilt-invoice"

[schedule]
window_start = "09:30:00"
"#;

    #[test]
    fn test_interpolate_env() {
        let out = interpolate_env("key=${A}, other=${MISSING}, keep=$B", |name| {
            (name == "A").then(|| "value".to_string())
        });
        assert_eq!(out, "key=value, other=, keep=$B");
    }

    #[test]
    fn test_parse_sections_and_defaults() {
        let config = Config::from_toml_str(SAMPLE, "sample").unwrap();

        assert_eq!(config.main.storage_root, PathBuf::from("/data/blobs"));
        assert_eq!(config.main.blob_container, "aarkglobal");
        assert_eq!(config.analysis.poll_interval_ms, 50);
        assert_eq!(config.analysis.max_retries, 3);
        assert_eq!(config.document_types.model_for("receipt"), Some("model-receipt-v2"));
        assert_eq!(config.document_types.model_for("INVOICE"), Some("prebuilt-invoice"));
        assert_eq!(
            config.schedule.window_start,
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(config.schedule.interval_secs, 15);
    }

    #[test]
    fn test_analysis_credentials_require_both_values() {
        let mut config = Config::default();
        let err = config.analysis_credentials().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingConfig);

        config.main.form_recognizer_key = "secret".to_string();
        let err = config.analysis_credentials().unwrap_err();
        assert!(err.to_string().contains("form_recognizer_endpoint"));

        config.main.form_recognizer_endpoint = "\"https://fr.example.com\"".to_string();
        let credentials = config.analysis_credentials().unwrap();
        assert_eq!(credentials.endpoint, "https://fr.example.com");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = Config::from_toml_str("[main\nenv = 1", "broken.toml").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path(), "prod").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingConfig);
    }

    #[tokio::test]
    async fn test_load_reads_environment_folder() {
        let dir = tempfile::tempdir().unwrap();
        let path = Config::file_path(dir.path(), "local");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[main]\nblob_container = \"custom\"\n").unwrap();

        let config = Config::load(dir.path(), "local").await.unwrap();
        assert_eq!(config.main.blob_container, "custom");
    }
}
