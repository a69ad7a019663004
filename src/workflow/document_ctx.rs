//! 文档处理上下文
//!
//! 封装"我正在处理本次运行的第几个文档"这一信息

use std::fmt::Display;

/// 文档处理上下文（仅用于日志）
#[derive(Debug, Clone)]
pub struct DocumentCtx {
    /// 运行 ID（短格式）
    pub run_id: String,

    /// 文档在本次运行中的序号（从1开始）
    pub index: usize,

    /// 本次运行的文档总数
    pub total: usize,
}

impl DocumentCtx {
    pub fn new(run_id: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            run_id: run_id.into(),
            index,
            total,
        }
    }
}

impl Display for DocumentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[运行 {} 文档 {}/{}]",
            self.run_id, self.index, self.total
        )
    }
}
