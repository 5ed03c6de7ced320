//! 骨骼动画运行时
//!
//! - skeleton: 骨骼描述、骨骼实例与姿态
//! - animation: 动画片段、混合树、状态图与批量更新的动画系统
//! - config: 全局运行时配置

pub mod animation;
pub mod config;
pub mod error;
pub mod skeleton;

pub use animation::{
    AnimationBlendTree, AnimationClip, AnimationStateGraph, AnimationSystem, InstanceId,
};
pub use error::{AnimError, Result};
pub use skeleton::{Skeleton, SkeletonDescription, SkeletonPose};
