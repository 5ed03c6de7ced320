//! 骨骼系统
//!
//! 核心设计思想：
//! - SkeletonDescription: 共享的关节层次与绑定姿态，构建后只读
//! - Skeleton: 每个渲染实例一份，保存关节变换与蒙皮矩阵
//! - SkeletonPose: 与关节索引平行的 (旋转, 偏移) 数组

mod description;
mod instance;
mod joint;
mod pose;

pub use description::{JointInfo, SkeletonDescription};
pub use instance::Skeleton;
pub use joint::Joint;
pub use pose::SkeletonPose;

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 关节局部变换
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointTransform {
    pub rotation: Quat,
    pub offset: Vec3,
}

impl Default for JointTransform {
    fn default() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            offset: Vec3::ZERO,
        }
    }
}

impl JointTransform {
    #[inline]
    pub fn new(rotation: Quat, offset: Vec3) -> Self {
        Self { rotation, offset }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.offset)
    }

    /// 从矩阵分解（忽略缩放）
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (_, rotation, offset) = m.to_scale_rotation_translation();
        Self { rotation, offset }
    }

    /// 旋转球面插值，偏移线性插值
    ///
    /// 结果旋转统一到 w >= 0 的半球，保证 a.lerp(b, t) 与 b.lerp(a, 1 - t) 分量一致
    #[inline]
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            rotation: canonical_rotation(self.rotation.slerp(other.rotation, t)),
            offset: self.offset.lerp(other.offset, t),
        }
    }
}

/// q 与 -q 表示同一旋转，取 w >= 0 的一个
#[inline]
pub(crate) fn canonical_rotation(q: Quat) -> Quat {
    if q.w < 0.0 {
        -q
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_matrix_roundtrip() {
        let t = JointTransform::new(Quat::from_rotation_y(0.7), Vec3::new(1.0, 2.0, 3.0));
        let back = JointTransform::from_matrix(t.to_matrix());
        assert!(back.offset.abs_diff_eq(t.offset, 1e-5));
        assert!(back.rotation.dot(t.rotation).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = JointTransform::new(Quat::IDENTITY, Vec3::ZERO);
        let b = JointTransform::new(Quat::from_rotation_z(1.0), Vec3::X);
        let start = a.lerp(&b, 0.0);
        let end = a.lerp(&b, 1.0);
        assert!(start.rotation.abs_diff_eq(a.rotation, 1e-5));
        assert!(end.rotation.abs_diff_eq(b.rotation, 1e-5));
        assert!(end.offset.abs_diff_eq(Vec3::X, 1e-6));
    }
}
