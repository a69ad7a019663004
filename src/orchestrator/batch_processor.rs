//! 批量文档处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次运行的文档处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建对象存储、生命周期存储和分析客户端
//! 2. **定位文档**：调用 `DocumentLocator`，整批致命错误直接中止运行
//! 3. **逐个处理**：按发现顺序串行处理，委托 `DocumentFlow`
//! 4. **优雅停止**：每个文档开始前检查关闭信号，进行中的文档总会走到终态
//! 5. **运行报告**：汇总每个文档的结果
//!
//! ## 设计特点
//!
//! - **单一 worker**：同一次运行内不并发处理文档
//! - **错误隔离**：单个文档失败不影响后续文档

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppResult, ErrorKind};
use crate::infrastructure::{
    AnalysisClient, HttpAnalysisClient, JsonFileLifecycleStore, LifecycleStore, LocalFileStore,
    ObjectStore,
};
use crate::orchestrator::scheduler::Scheduler;
use crate::services::{
    AnalysisInvoker, DocumentLocator, LifecycleRecorder, SkippedFile, StateTransitionManager,
};
use crate::utils::logging::{self, truncate_text};
use crate::workflow::{DocumentCtx, DocumentFlow, ProcessOutcome, ProcessedDocument};

/// 应用主结构
pub struct App {
    config: Arc<Config>,
    orchestrator: BatchOrchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, shutdown: watch::Receiver<bool>) -> AppResult<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.logging.log_file)?;

        logging::log_startup(&config);

        let config = Arc::new(config);
        let store = Arc::new(LocalFileStore::new(
            config.main.storage_root.clone(),
            config.main.access_reference_secret.clone(),
        ));
        let lifecycle = Arc::new(JsonFileLifecycleStore::new(
            config.main.lifecycle_store_dir.clone(),
        ));
        let client = Arc::new(HttpAnalysisClient::new(&config.analysis)?);

        let orchestrator = BatchOrchestrator::new(config.clone(), store, lifecycle, client)
            .with_shutdown(shutdown);

        Ok(Self {
            config,
            orchestrator,
        })
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    /// 运行应用主逻辑：单次运行或按计划循环
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> AppResult<()> {
        if !self.config.schedule.run_once {
            Scheduler::new(&self.orchestrator, &self.config.schedule)
                .run(shutdown)
                .await;
            return Ok(());
        }

        match self.orchestrator.run_once().await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NoActionableInput => {
                info!("💤 {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// 单次运行报告
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 按处理顺序排列
    pub documents: Vec<ProcessedDocument>,
    /// 扫描时留在原位的文件，下次运行仍会被跳过，需要人工处理
    pub skipped: Vec<SkippedFile>,
    /// 是否因关闭信号提前结束
    pub stopped_early: bool,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.documents.len()
    }

    pub fn successful(&self) -> usize {
        self.count(|o| matches!(o, ProcessOutcome::Successful))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ProcessOutcome::Failed { .. }))
    }

    pub fn abandoned(&self) -> usize {
        self.count(|o| matches!(o, ProcessOutcome::Abandoned { .. }))
    }

    fn count(&self, predicate: impl Fn(&ProcessOutcome) -> bool) -> usize {
        self.documents.iter().filter(|d| predicate(&d.outcome)).count()
    }
}

/// 批量编排器
pub struct BatchOrchestrator {
    locator: DocumentLocator,
    flow: DocumentFlow,
    shutdown: Option<watch::Receiver<bool>>,
}

impl BatchOrchestrator {
    /// 用显式注入的组件创建编排器
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ObjectStore>,
        lifecycle: Arc<dyn LifecycleStore>,
        client: Arc<dyn AnalysisClient>,
    ) -> Self {
        let container = config.main.blob_container.clone();

        let locator = DocumentLocator::new(
            store.clone(),
            lifecycle.clone(),
            container.clone(),
            config.document_types.clone(),
        );
        let flow = DocumentFlow::new(
            StateTransitionManager::new(store.clone(), container),
            AnalysisInvoker::new(config, client, store),
            LifecycleRecorder::new(lifecycle),
        );

        Self {
            locator,
            flow,
            shutdown: None,
        }
    }

    /// 设置关闭信号（值变为 `true` 后不再开始新文档）
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().map_or(false, |rx| *rx.borrow())
    }

    /// 执行一次完整运行
    ///
    /// 定位失败（如 `FolderMissing`）时在处理任何文档之前返回错误；
    /// 单个文档的失败只体现在报告中。
    pub async fn run_once(&self) -> AppResult<RunReport> {
        let run_id = Uuid::new_v4();
        let short_id: String = run_id.simple().to_string().chars().take(8).collect();
        let started_at = Utc::now();

        info!("\n📁 [运行 {}] 正在扫描待处理的文档...", short_id);
        let batch = match self.locator.locate().await {
            Ok(batch) => batch,
            Err(e) => {
                if e.is_batch_fatal() {
                    warn!("[运行 {}] ⚠️ 扫描中止，未处理任何文档: {}", short_id, e);
                } else {
                    error!("[运行 {}] ❌ 扫描失败: {}", short_id, e);
                }
                return Err(e);
            }
        };

        let documents = batch.documents;
        let total = documents.len();
        log_run_start(&short_id, total);

        let mut processed = Vec::with_capacity(total);
        let mut stopped_early = false;

        for (idx, document) in documents.into_iter().enumerate() {
            if self.shutdown_requested() {
                warn!(
                    "[运行 {}] 🛑 收到关闭信号，剩余 {} 个文档留待下次运行",
                    short_id,
                    total - idx
                );
                stopped_early = true;
                break;
            }

            let ctx = DocumentCtx::new(short_id.clone(), idx + 1, total);
            let result = self.flow.run(document, &ctx).await;
            processed.push(result);
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            documents: processed,
            skipped: batch.skipped,
            stopped_early,
        };
        print_run_stats(&short_id, &report);
        Ok(report)
    }
}

// ========== 日志辅助函数 ==========

fn log_run_start(run_id: &str, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 [运行 {}] 找到 {} 个待处理的文档", run_id, total);
    info!("💡 按发现顺序逐个处理");
    info!("{}", "=".repeat(60));
}

fn print_run_stats(run_id: &str, report: &RunReport) {
    info!("\n{}", "=".repeat(60));
    info!("📊 [运行 {}] 处理完成统计", run_id);
    info!(
        "完成时间: {}",
        report.finished_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for processed in &report.documents {
        match &processed.outcome {
            ProcessOutcome::Successful => info!(
                "  ✅ {} -> {}",
                processed.document.identifier(),
                processed.document.current_state()
            ),
            ProcessOutcome::Failed { reason, .. } | ProcessOutcome::Abandoned { reason, .. } => {
                info!(
                    "  ❌ {} -> {} [{}] {}",
                    processed.document.identifier(),
                    processed.document.current_state(),
                    processed.outcome,
                    truncate_text(reason, 120)
                )
            }
        }
    }
    for skipped in &report.skipped {
        warn!("  ⏭️ {} [跳过] {}", skipped.key, truncate_text(&skipped.reason.to_string(), 120));
    }
    info!("✅ 成功: {}/{}", report.successful(), report.total());
    info!("❌ 失败: {}", report.failed());
    if !report.skipped.is_empty() {
        warn!("⏭️ 跳过: {} (留在 Validation-Successful)", report.skipped.len());
    }
    if report.abandoned() > 0 {
        error!("⚠️ 滞留: {} (需要人工处理)", report.abandoned());
    }
    if report.stopped_early {
        warn!("🛑 本次运行因关闭信号提前结束");
    }
    info!("{}", "=".repeat(60));
}
