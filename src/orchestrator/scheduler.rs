//! 定时调度
//!
//! 在允许的时间窗口内每隔固定间隔触发一次 `run_once`；上一次运行结束前不会开始下一次。

use std::time::Duration;

use chrono::{Local, NaiveTime};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::orchestrator::batch_processor::BatchOrchestrator;

/// 每日允许运行的时间窗口（本地时间，含两端）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl RunWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// `start > end` 表示跨午夜的窗口
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

/// 定时调度器
pub struct Scheduler<'a> {
    orchestrator: &'a BatchOrchestrator,
    window: RunWindow,
    interval: Duration,
}

impl<'a> Scheduler<'a> {
    pub fn new(orchestrator: &'a BatchOrchestrator, config: &ScheduleConfig) -> Self {
        Self {
            orchestrator,
            window: RunWindow::new(config.window_start, config.window_end),
            interval: Duration::from_secs(config.interval_secs),
        }
    }

    /// 循环运行直到收到关闭信号
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "⏰ 调度启动: 每 {} 秒运行一次，时间窗口 {} - {}",
            self.interval.as_secs(),
            self.window.start,
            self.window.end
        );

        loop {
            if *shutdown.borrow() {
                info!("🛑 调度已停止");
                return;
            }

            let now = Local::now().time();
            if self.window.contains(now) {
                match self.orchestrator.run_once().await {
                    Ok(report) => debug!("运行 {} 结束", report.run_id),
                    Err(e) if e.is_batch_fatal() => info!("💤 本次没有可处理的文档: {}", e),
                    Err(e) => error!("❌ 运行失败: {}", e),
                }
            } else {
                debug!("当前时间 {} 不在运行窗口内，跳过", now.format("%H:%M:%S"));
            }

            tokio::select! {
                _ = sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // 发送端已关闭，不会再有信号
                        warn!("关闭信号通道已关闭");
                        sleep(self.interval).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_daytime_window_is_inclusive() {
        let window = RunWindow::new(time(8, 0, 0), time(23, 0, 0));
        assert!(window.contains(time(8, 0, 0)));
        assert!(window.contains(time(12, 30, 0)));
        assert!(window.contains(time(23, 0, 0)));
        assert!(!window.contains(time(7, 59, 59)));
        assert!(!window.contains(time(23, 0, 1)));
    }

    #[test]
    fn test_overnight_window() {
        let window = RunWindow::new(time(22, 0, 0), time(6, 0, 0));
        assert!(window.contains(time(23, 30, 0)));
        assert!(window.contains(time(2, 0, 0)));
        assert!(!window.contains(time(12, 0, 0)));
    }
}
