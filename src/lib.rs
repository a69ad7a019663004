//! # Citadel IDP
//!
//! 文档智能处理后端：把租户上传的文档送入分析服务，并跟踪每个文档的生命周期直到终态
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露能力，不认识业务规则
//! - `ObjectStore` / `LocalFileStore` - 对象存储（列举、复制、删除、限时访问凭证）
//! - `LifecycleStore` / `JsonFileLifecycleStore` - 生命周期元数据存储
//! - `AnalysisClient` / `HttpAnalysisClient` - 文档分析服务
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个 Document
//! - `DocumentLocator` - 扫描 Validation-Successful 文件夹
//! - `StateTransitionManager` - 文件夹之间的状态转移
//! - `AnalysisInvoker` - 调用分析服务并保存结果信封
//! - `LifecycleRecorder` - 追加生命周期历史
//! - `ErrorClass` - 失败分类
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文档"的完整处理流程
//! - `DocumentCtx` - 上下文封装（运行 ID + 文档序号）
//! - `DocumentFlow` - 流程编排（in-progress → analyze → terminal）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 一次运行：定位、逐个处理、运行报告
//! - `orchestrator/scheduler` - 按时间窗口定时触发运行
//!
//! ## 生命周期
//!
//! ```text
//! Company-*/Validation-Successful → Company-*/Inprogress → Company-*/Successful
//!                                                       ↘ Company-*/Failed
//! ```
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppResult, ErrorKind, ProcessingError};
pub use models::{Document, DocumentTypeMapping, LifecycleState, LifecycleStatus};
pub use orchestrator::{App, BatchOrchestrator, RunReport};
pub use workflow::{ProcessOutcome, ProcessedDocument};
