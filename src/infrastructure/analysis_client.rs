//! 文档分析服务客户端 - 基础设施层
//!
//! 封装提交分析任务和查询任务状态的 HTTP 调用，不包含等待/超时策略。

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{AnalysisConfig, AnalysisCredentials};
use crate::error::{AppResult, ProcessingError};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// 已提交的分析任务（服务返回的任务地址）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 提交给分析服务的文档来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisSource {
    /// 服务可直接下载的 http(s) 地址
    Url(String),
    /// 文档内容（本地存储时服务无法访问文件地址）
    Bytes(Vec<u8>),
}

impl AnalysisSource {
    /// 请求体：`urlSource` 或 `base64Source`
    pub fn request_body(&self) -> Value {
        match self {
            AnalysisSource::Url(url) => json!({ "urlSource": url }),
            AnalysisSource::Bytes(bytes) => json!({
                "base64Source": base64::engine::general_purpose::STANDARD.encode(bytes)
            }),
        }
    }
}

/// 分析任务状态
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Running,
    Succeeded(Value),
    Failed(String),
}

/// 文档分析服务
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// 提交分析任务
    async fn submit(
        &self,
        credentials: &AnalysisCredentials,
        model_id: &str,
        source: &AnalysisSource,
    ) -> AppResult<JobHandle>;

    /// 查询任务状态
    async fn poll(&self, credentials: &AnalysisCredentials, job: &JobHandle) -> AppResult<JobStatus>;
}

/// 基于 reqwest 的 REST 客户端
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    api_version: String,
    max_retries: usize,
    retry_delay: Duration,
}

impl HttpAnalysisClient {
    pub fn new(config: &AnalysisConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProcessingError::backend(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            http,
            api_version: config.api_version.clone(),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    fn analyze_url(&self, endpoint: &str, model_id: &str) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            endpoint.trim_end_matches('/'),
            model_id,
            self.api_version
        )
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn submit(
        &self,
        credentials: &AnalysisCredentials,
        model_id: &str,
        source: &AnalysisSource,
    ) -> AppResult<JobHandle> {
        let url = self.analyze_url(&credentials.endpoint, model_id);
        let body = source.request_body();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("提交分析任务 (尝试 {}/{}): {}", attempt, self.max_retries, url);

            let response = self
                .http
                .post(&url)
                .header(SUBSCRIPTION_KEY_HEADER, &credentials.key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let location = resp
                        .headers()
                        .get(OPERATION_LOCATION_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .ok_or_else(|| {
                            ProcessingError::backend("分析服务响应缺少 Operation-Location")
                        })?;
                    return Ok(JobHandle(location.to_string()));
                }
                Ok(resp) if is_retryable(resp.status()) && attempt < self.max_retries => {
                    warn!(
                        "分析服务返回 {} (尝试 {}/{})，{}ms 后重试...",
                        resp.status(),
                        attempt,
                        self.max_retries,
                        self.retry_delay.as_millis()
                    );
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    return Err(ProcessingError::backend(format!(
                        "提交分析任务失败 ({}): {}",
                        status, text
                    )));
                }
                Err(e) if attempt < self.max_retries => {
                    warn!(
                        "请求分析服务失败 (尝试 {}/{}): {}",
                        attempt, self.max_retries, e
                    );
                }
                Err(e) => return Err(ProcessingError::http(url, e)),
            }

            sleep(self.retry_delay).await;
        }
    }

    async fn poll(&self, credentials: &AnalysisCredentials, job: &JobHandle) -> AppResult<JobStatus> {
        let resp = self
            .http
            .get(job.as_str())
            .header(SUBSCRIPTION_KEY_HEADER, &credentials.key)
            .send()
            .await
            .map_err(|e| ProcessingError::http(job.as_str(), e))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            debug!("查询任务被限流，稍后重试");
            return Ok(JobStatus::Running);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProcessingError::backend(format!(
                "查询分析任务失败 ({}): {}",
                status, text
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProcessingError::http(job.as_str(), e))?;
        Ok(parse_job_status(&body))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// 解析任务查询响应
fn parse_job_status(body: &Value) -> JobStatus {
    match body.get("status").and_then(|s| s.as_str()) {
        Some("notStarted") | Some("running") => JobStatus::Running,
        Some("succeeded") => {
            JobStatus::Succeeded(body.get("analyzeResult").cloned().unwrap_or(Value::Null))
        }
        Some("failed") => {
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("分析服务未返回错误信息");
            JobStatus::Failed(message.to_string())
        }
        other => JobStatus::Failed(format!("未知的任务状态: {:?}", other)),
    }
}
