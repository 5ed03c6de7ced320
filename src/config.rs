//! 动画运行时配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 动画配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct AnimationConfig {
    // ========== 并行求值 ==========
    /// 是否使用 rayon 并行计算姿态，默认 true
    pub parallel_pose_evaluation: bool,
    /// 存活实例数达到此值才启用并行，默认 64
    /// 实例太少时线程调度开销大于收益
    pub parallel_min_instances: usize,

    // ========== 调试 ==========
    /// 是否输出每帧调试日志，默认 false
    pub debug_log: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            parallel_pose_evaluation: true,
            parallel_min_instances: 64,
            debug_log: false,
        }
    }
}

/// 全局配置实例
static ANIMATION_CONFIG: Lazy<RwLock<AnimationConfig>> =
    Lazy::new(|| RwLock::new(AnimationConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> AnimationConfig {
    ANIMATION_CONFIG
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: AnimationConfig) {
    *ANIMATION_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *ANIMATION_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = AnimationConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnimationConfig::default();
        assert!(config.parallel_pose_evaluation);
        assert_eq!(config.parallel_min_instances, 64);
        assert!(!config.debug_log);
    }
}
