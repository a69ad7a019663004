//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次运行的调度和统计，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量文档处理器
//! - 管理应用生命周期（初始化、运行）
//! - 定位本次运行的文档（Vec<Document>）
//! - 逐个委托 DocumentFlow，检查关闭信号
//! - 输出运行报告
//!
//! ### `scheduler` - 定时调度
//! - 按间隔触发 `run_once`
//! - 时间窗口之外跳过
//!
//! ## 层次关系
//!
//! ```text
//! scheduler (按时间触发)
//!     ↓
//! batch_processor (处理 Vec<Document>)
//!     ↓
//! workflow::DocumentFlow (处理单个 Document)
//!     ↓
//! services (能力层：locate / transition / analyze / record / classify)
//!     ↓
//! infrastructure (基础设施：ObjectStore / LifecycleStore / AnalysisClient)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：scheduler 管时间，batch_processor 管一次运行
//! 2. **资源隔离**：只有编排层创建存储和客户端
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;
pub mod scheduler;

// 重新导出主要类型
pub use batch_processor::{App, BatchOrchestrator, RunReport};
pub use scheduler::{RunWindow, Scheduler};
