//! 骨骼姿态
//!
//! 与 SkeletonDescription 关节索引平行的 (旋转, 偏移) 数组。
//! 只有共享同一个 SkeletonDescription 的姿态才能混合。

use std::sync::Arc;

use super::{JointTransform, SkeletonDescription};
use crate::{AnimError, Result};

/// 骨骼姿态（值类型）
#[derive(Clone, Debug)]
pub struct SkeletonPose {
    description: Arc<SkeletonDescription>,
    joints: Vec<JointTransform>,
}

impl SkeletonPose {
    /// 绑定姿态
    pub fn bind(description: &Arc<SkeletonDescription>) -> Self {
        let joints = description
            .joints()
            .iter()
            .map(|j| j.bind_transform())
            .collect();
        Self {
            description: Arc::clone(description),
            joints,
        }
    }

    /// 从逐关节变换创建，数量必须与关节数一致
    pub fn from_transforms(
        description: &Arc<SkeletonDescription>,
        joints: Vec<JointTransform>,
    ) -> Result<Self> {
        if joints.len() != description.joint_count() {
            return Err(AnimError::SkeletonMismatch);
        }
        Ok(Self {
            description: Arc::clone(description),
            joints,
        })
    }

    /// 调用方保证关节数一致
    #[inline]
    pub(crate) fn from_parts(
        description: Arc<SkeletonDescription>,
        joints: Vec<JointTransform>,
    ) -> Self {
        debug_assert_eq!(joints.len(), description.joint_count());
        Self { description, joints }
    }

    #[inline]
    pub fn description(&self) -> &Arc<SkeletonDescription> {
        &self.description
    }

    /// 两个姿态是否可以混合
    #[inline]
    pub fn is_compatible(&self, other: &SkeletonPose) -> bool {
        Arc::ptr_eq(&self.description, &other.description)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    #[inline]
    pub fn joints(&self) -> &[JointTransform] {
        &self.joints
    }

    #[inline]
    pub fn joint(&self, index: usize) -> Option<&JointTransform> {
        self.joints.get(index)
    }

    pub fn set_joint(&mut self, index: usize, transform: JointTransform) -> Result<()> {
        let count = self.joints.len();
        let slot = self
            .joints
            .get_mut(index)
            .ok_or(AnimError::JointOutOfRange { joint: index, count })?;
        *slot = transform;
        Ok(())
    }

    /// 逐关节插值，返回新姿态
    pub fn lerp(&self, other: &SkeletonPose, t: f32) -> Result<SkeletonPose> {
        let mut out = self.clone();
        out.lerp_in_place(other, t)?;
        Ok(out)
    }

    /// 逐关节插值（原地）
    pub fn lerp_in_place(&mut self, other: &SkeletonPose, t: f32) -> Result<()> {
        if !self.is_compatible(other) {
            return Err(AnimError::SkeletonMismatch);
        }
        for (a, b) in self.joints.iter_mut().zip(&other.joints) {
            *a = a.lerp(b, t);
        }
        Ok(())
    }
}
