//! 文档处理流程 - 流程层
//!
//! 核心职责：定义"一个文档"的完整处理流程
//!
//! 流程顺序：
//! 1. 记录 PROCESSING → 移动到 Inprogress → 记录 IN_PROGRESS
//! 2. 调用分析服务并保存结果
//! 3. 移动到 Successful → 记录 SUCCESS
//!
//! 任一步失败：分类 → 移动到 Failed → 记录 FAILED，错误不会离开本文档。

use std::fmt;

use tracing::{error, info, warn};

use crate::error::{AppResult, ProcessingError};
use crate::models::{Document, LifecycleState, LifecycleStatus};
use crate::services::{AnalysisInvoker, ErrorClass, LifecycleRecorder, StateTransitionManager};
use crate::workflow::document_ctx::DocumentCtx;

/// 单个文档的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 处理成功，文档位于 Successful
    Successful,
    /// 处理失败，文档位于 Failed
    Failed { class: ErrorClass, reason: String },
    /// 失败后的收尾也失败了，文档滞留在原位置，需要人工处理
    Abandoned { class: ErrorClass, reason: String },
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Successful)
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Successful => write!(f, "成功"),
            ProcessOutcome::Failed { class, .. } => write!(f, "失败 ({})", class),
            ProcessOutcome::Abandoned { class, .. } => write!(f, "滞留 ({})", class),
        }
    }
}

/// 处理完成的文档
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub document: Document,
    pub outcome: ProcessOutcome,
}

/// 文档处理流程
///
/// - 编排单个文档的状态转移、分析和历史记录
/// - 在文档边界捕获所有错误
pub struct DocumentFlow {
    transitions: StateTransitionManager,
    invoker: AnalysisInvoker,
    recorder: LifecycleRecorder,
}

impl DocumentFlow {
    pub fn new(
        transitions: StateTransitionManager,
        invoker: AnalysisInvoker,
        recorder: LifecycleRecorder,
    ) -> Self {
        Self {
            transitions,
            invoker,
            recorder,
        }
    }

    /// 处理一个文档直到终态；永远不会返回错误
    pub async fn run(&self, mut document: Document, ctx: &DocumentCtx) -> ProcessedDocument {
        info!(
            "{} 📄 开始处理: {} (类型: {})",
            ctx,
            document.identifier(),
            document.document_type()
        );

        let outcome = match self.process(&mut document, ctx).await {
            Ok(()) => {
                info!("{} ✅ 处理成功: {}", ctx, document.current_path());
                ProcessOutcome::Successful
            }
            Err(e) => self.handle_failure(&mut document, ctx, e).await,
        };

        ProcessedDocument { document, outcome }
    }

    async fn process(&self, document: &mut Document, ctx: &DocumentCtx) -> AppResult<()> {
        self.recorder
            .record(document, LifecycleStatus::Processing, "文档已发现，开始处理")
            .await?;

        // ========== 阶段 1: 移动到 Inprogress ==========
        self.transitions
            .transition(document, LifecycleState::InProgress)
            .await?;
        let message = format!("已移动到 {}", document.current_path());
        self.recorder
            .record(document, LifecycleStatus::InProgress, message)
            .await?;
        self.recorder.sync(document).await?;

        // ========== 阶段 2: 分析 ==========
        info!("{} 🔍 调用分析服务 (模型: {})", ctx, document.analysis_model_id());
        self.invoker.analyze(document).await?;

        // ========== 阶段 3: 移动到 Successful ==========
        self.transitions
            .transition(document, LifecycleState::Successful)
            .await?;
        self.recorder
            .record(document, LifecycleStatus::Success, "分析完成")
            .await?;
        self.recorder.sync(document).await?;

        Ok(())
    }

    /// 分类错误并把文档移动到 Failed
    async fn handle_failure(
        &self,
        document: &mut Document,
        ctx: &DocumentCtx,
        error: ProcessingError,
    ) -> ProcessOutcome {
        let class = ErrorClass::classify(&error);
        let reason = class.failure_message(&error);
        error!("{} ❌ {}", ctx, reason);

        if document.current_state().is_terminal() {
            // 已到终态但历史没有写完，无法再转移
            error!(
                "{} ⚠️ 文档已在 {}，但生命周期历史不完整",
                ctx,
                document.current_state()
            );
            return ProcessOutcome::Abandoned { class, reason };
        }

        let target = class.terminal_state();
        let moved = self.transitions.transition(document, target).await;
        let recorded = self
            .recorder
            .record(document, LifecycleStatus::Failed, reason.clone())
            .await;
        if let Err(e) = self.recorder.sync(document).await {
            warn!("{} 同步文档记录失败: {}", ctx, e);
        }

        match (moved, recorded) {
            (Ok(()), Ok(())) => {
                info!("{} 已移动到 {}", ctx, document.current_path());
                ProcessOutcome::Failed { class, reason }
            }
            (Err(e), _) => {
                error!(
                    "{} ⚠️ 无法移动到 {}，文档滞留在 {}: {}",
                    ctx,
                    target,
                    document.current_path(),
                    e
                );
                ProcessOutcome::Abandoned {
                    class,
                    reason: format!("{}; 移动到 {} 失败: {}", reason, target, e),
                }
            }
            (Ok(()), Err(e)) => {
                error!("{} ⚠️ 失败记录未能写入，生命周期历史缺失: {}", ctx, e);
                ProcessOutcome::Abandoned {
                    class,
                    reason: format!("{}; 记录失败状态失败: {}", reason, e),
                }
            }
        }
    }
}
