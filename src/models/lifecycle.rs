//! 生命周期状态与历史记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 租户文件夹前缀
pub const COMPANY_ROOT_FOLDER_PREFIX: &str = "Company-";
/// 生命周期子文件夹（始终是租户文件夹下的兄弟目录）
pub const VALIDATION_SUCCESSFUL_SUBFOLDER: &str = "/Validation-Successful";
pub const INPROGRESS_SUBFOLDER: &str = "/Inprogress";
pub const SUCCESSFUL_SUBFOLDER: &str = "/Successful";
pub const FAILED_SUBFOLDER: &str = "/Failed";

/// 文档生命周期状态
///
/// 线性、单调：`ValidationSuccessful → InProgress → {Successful, Failed}`，
/// `Successful` 与 `Failed` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    ValidationSuccessful,
    InProgress,
    Successful,
    Failed,
}

impl LifecycleState {
    /// 状态对应的文件夹标记（带前导 `/`）
    pub fn folder_token(self) -> &'static str {
        match self {
            LifecycleState::ValidationSuccessful => VALIDATION_SUCCESSFUL_SUBFOLDER,
            LifecycleState::InProgress => INPROGRESS_SUBFOLDER,
            LifecycleState::Successful => SUCCESSFUL_SUBFOLDER,
            LifecycleState::Failed => FAILED_SUBFOLDER,
        }
    }

    /// 状态对应的文件夹名（不带 `/`）
    pub fn folder_name(self) -> &'static str {
        &self.folder_token()[1..]
    }

    /// 从文件夹名解析状态
    pub fn from_folder_name(name: &str) -> Option<Self> {
        [
            LifecycleState::ValidationSuccessful,
            LifecycleState::InProgress,
            LifecycleState::Successful,
            LifecycleState::Failed,
        ]
        .into_iter()
        .find(|state| state.folder_name() == name)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Successful | LifecycleState::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            LifecycleState::ValidationSuccessful => 0,
            LifecycleState::InProgress => 1,
            LifecycleState::Successful | LifecycleState::Failed => 2,
        }
    }

    /// 是否允许转移到目标状态
    ///
    /// 只能向前；进入 `InProgress` 之前失败的文档可以直接进入 `Failed`，
    /// 但不能跳过 `InProgress` 直接成功。
    pub fn can_transition_to(self, target: LifecycleState) -> bool {
        if self.is_terminal() || target.rank() <= self.rank() {
            return false;
        }
        !(self == LifecycleState::ValidationSuccessful && target == LifecycleState::Successful)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::ValidationSuccessful => "ValidationSuccessful",
            LifecycleState::InProgress => "InProgress",
            LifecycleState::Successful => "Successful",
            LifecycleState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// 生命周期记录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// 文档被发现并开始处理
    Processing,
    InProgress,
    Success,
    Failed,
}

impl LifecycleStatus {
    /// 终态状态对应的记录状态
    pub fn for_terminal(state: LifecycleState) -> Option<Self> {
        match state {
            LifecycleState::Successful => Some(LifecycleStatus::Success),
            LifecycleState::Failed => Some(LifecycleStatus::Failed),
            _ => None,
        }
    }
}

/// 一条生命周期历史记录（只追加，不修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub status: LifecycleStatus,
    pub message: String,
    pub updated_date_time: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn now(status: LifecycleStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            updated_date_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_forward_only() {
        use LifecycleState::*;

        assert!(ValidationSuccessful.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Successful));
        assert!(InProgress.can_transition_to(Failed));
        assert!(ValidationSuccessful.can_transition_to(Failed));

        assert!(!ValidationSuccessful.can_transition_to(Successful));
        assert!(!InProgress.can_transition_to(ValidationSuccessful));
        assert!(!InProgress.can_transition_to(InProgress));
        assert!(!Successful.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Successful));
    }

    #[test]
    fn test_folder_names_round_trip() {
        assert_eq!(
            LifecycleState::from_folder_name("Validation-Successful"),
            Some(LifecycleState::ValidationSuccessful)
        );
        assert_eq!(
            LifecycleState::from_folder_name("Inprogress"),
            Some(LifecycleState::InProgress)
        );
        assert_eq!(LifecycleState::from_folder_name("Archive"), None);
        assert_eq!(LifecycleState::Failed.folder_token(), "/Failed");
    }
}
