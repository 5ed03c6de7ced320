//! 动画引擎错误类型

use std::io;
use thiserror::Error;

use crate::animation::InstanceId;

/// 动画引擎错误
#[derive(Error, Debug)]
pub enum AnimError {
    /// 实例 ID 无效（越界、已销毁或代数不匹配）
    #[error("Invalid animation instance: {0:?}")]
    InvalidInstance(InstanceId),

    /// 关节索引越界
    #[error("Joint index {joint} out of range (skeleton has {count} joints)")]
    JointOutOfRange { joint: usize, count: usize },

    /// 父关节必须排在子关节之前
    #[error("Joint '{name}' at index {index} has invalid parent {parent}")]
    InvalidJointParent {
        name: String,
        index: usize,
        parent: usize,
    },

    /// 姿态与骨骼描述不匹配
    #[error("Skeleton description mismatch")]
    SkeletonMismatch,

    /// 未知状态
    #[error("Unknown state: {0}")]
    UnknownState(String),

    /// 重复状态
    #[error("Duplicate state: {0}")]
    DuplicateState(String),

    /// 保留名不能用作状态名
    #[error("State name '{0}' is reserved")]
    ReservedStateName(String),

    /// 状态图中没有任何状态
    #[error("State graph '{0}' has no states")]
    EmptyGraph(String),

    /// 混合树构建错误
    #[error("Blend tree error: {0}")]
    BlendTree(String),

    /// 状态图加载错误
    #[error("Graph load error: {0}")]
    GraphLoad(String),

    /// JSON 解析错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// 使用 AnimError 的 Result 类型
pub type Result<T> = std::result::Result<T, AnimError>;
