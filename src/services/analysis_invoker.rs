//! 分析调用服务
//!
//! 提交文档到分析服务、等待任务结束、把结果信封写入输出容器。
//! 整条流水线里只有这里有超时/重试策略。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{AnalysisCredentials, Config};
use crate::error::{AppResult, ProcessingError};
use crate::infrastructure::{AnalysisClient, AnalysisSource, JobHandle, JobStatus, ObjectStore};
use crate::models::lifecycle::INPROGRESS_SUBFOLDER;
use crate::models::{Document, LifecycleState, ResultLocation};

/// 结果信封的文件后缀
pub const RESULT_SUFFIX: &str = ".json";

/// 分析调用器
pub struct AnalysisInvoker {
    config: Arc<Config>,
    client: Arc<dyn AnalysisClient>,
    store: Arc<dyn ObjectStore>,
}

impl AnalysisInvoker {
    pub fn new(
        config: Arc<Config>,
        client: Arc<dyn AnalysisClient>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    /// 分析文档并持久化结果
    ///
    /// 成功后 `document.analysis_result()` 与 `document.result_location()` 均已填充。
    pub async fn analyze(&self, document: &mut Document) -> AppResult<()> {
        let credentials = self.config.analysis_credentials()?;

        let access_url = match document.access_reference() {
            Some(reference) if reference.is_valid_at(Utc::now()) => reference.url.clone(),
            Some(_) => return Err(ProcessingError::backend("访问凭证已过期")),
            None => return Err(ProcessingError::backend("访问凭证为空")),
        };

        let location = result_location_for(document, &self.config.main.json_output_container);
        // 提前检查，避免为注定写不进去的结果占用分析任务；输出容器在第一次写入时创建
        if self.store.container_exists(&location.container).await?
            && self.store.exists(&location.container, &location.key).await?
        {
            return Err(ProcessingError::DuplicateResult {
                container: location.container,
                key: location.key,
            });
        }

        info!(
            "提交分析: 模型 {} / 文件 {}",
            document.analysis_model_id(),
            document.base_name()
        );
        let source = self.analysis_source(document, access_url).await?;
        let job = self
            .client
            .submit(&credentials, document.analysis_model_id(), &source)
            .await?;
        debug!("分析任务: {}", job.as_str());

        let result = self.wait_for_completion(&credentials, &job).await?;

        let envelope = json!({
            "input_file_name": document.base_name(),
            "recognizer_result_data": [result],
        });
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        self.store
            .put_object_if_absent(&location.container, &location.key, &bytes)
            .await?;

        info!("分析结果已保存: {}/{}", location.container, location.key);
        document.set_analysis_result(result, location);
        Ok(())
    }

    /// 服务能下载 http(s) 地址；其他地址（本地存储的 `file://`）改为上传内容
    async fn analysis_source(&self, document: &Document, access_url: String) -> AppResult<AnalysisSource> {
        if is_remote_url(&access_url) {
            return Ok(AnalysisSource::Url(access_url));
        }

        let bytes = self
            .store
            .get_object(&self.config.main.blob_container, &document.current_path())
            .await?;
        debug!("本地文档，上传内容 ({} 字节)", bytes.len());
        Ok(AnalysisSource::Bytes(bytes))
    }

    async fn wait_for_completion(
        &self,
        credentials: &AnalysisCredentials,
        job: &JobHandle,
    ) -> AppResult<Value> {
        let interval = Duration::from_millis(self.config.analysis.poll_interval_ms);
        let timeout = Duration::from_secs(self.config.analysis.timeout_secs);
        let started = Instant::now();

        loop {
            match self.client.poll(credentials, job).await? {
                JobStatus::Succeeded(result) => return Ok(result),
                JobStatus::Failed(message) => {
                    return Err(ProcessingError::backend(format!("分析任务失败: {}", message)))
                }
                JobStatus::Running => {
                    if started.elapsed() >= timeout {
                        return Err(ProcessingError::AnalysisTimeout {
                            job: job.as_str().to_string(),
                            elapsed_secs: started.elapsed().as_secs(),
                        });
                    }
                    sleep(interval).await;
                }
            }
        }
    }
}

fn is_remote_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

/// 结果信封地址：进行中路径去掉 `Inprogress` 文件夹后加后缀
pub fn result_location_for(document: &Document, output_container: &str) -> ResultLocation {
    let in_progress = document.path_for(LifecycleState::InProgress);
    let key = in_progress.replacen(&format!("{}/", INPROGRESS_SUBFOLDER), "/", 1);
    ResultLocation {
        container: output_container.to_string(),
        key: format!("{}{}", key, RESULT_SUFFIX),
    }
}
