//! 骨骼实例
//!
//! 每个渲染实例一份。流程：set_pose → apply_current_pose → compute_skinning_matrices，
//! 每帧开始前用 copy_last_skinning_matrices 保存上一帧结果（用于运动矢量）。

use std::sync::Arc;

use glam::{Mat4, Quat};

use super::{Joint, SkeletonDescription, SkeletonPose};
use crate::{AnimError, Result};

/// 骨骼实例
#[derive(Clone, Debug)]
pub struct Skeleton {
    description: Arc<SkeletonDescription>,
    joints: Vec<Joint>,
    /// 当前帧蒙皮矩阵
    skinning_matrices: Vec<Mat4>,
    /// 上一帧蒙皮矩阵
    last_skinning_matrices: Vec<Mat4>,
}

impl Skeleton {
    /// 创建骨骼实例，初始为绑定姿态
    pub fn new(description: Arc<SkeletonDescription>) -> Self {
        let joints: Vec<Joint> = description
            .joints()
            .iter()
            .enumerate()
            .map(|(i, info)| Joint::from_info(i, info))
            .collect();
        let count = joints.len();

        let mut skeleton = Self {
            description,
            joints,
            skinning_matrices: vec![Mat4::IDENTITY; count],
            last_skinning_matrices: vec![Mat4::IDENTITY; count],
        };
        skeleton.apply_current_pose();
        skeleton.compute_skinning_matrices();
        skeleton.copy_last_skinning_matrices();
        skeleton
    }

    #[inline]
    pub fn description(&self) -> &Arc<SkeletonDescription> {
        &self.description
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    #[inline]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// 写入局部姿态（不更新世界矩阵）
    pub fn set_pose(&mut self, pose: &SkeletonPose) -> Result<()> {
        if !Arc::ptr_eq(&self.description, pose.description()) {
            return Err(AnimError::SkeletonMismatch);
        }
        for (joint, transform) in self.joints.iter_mut().zip(pose.joints()) {
            joint.set_local_pose(*transform);
        }
        Ok(())
    }

    /// 读取当前局部姿态
    pub fn current_pose(&self) -> SkeletonPose {
        let transforms = self.joints.iter().map(Joint::local_pose).collect();
        SkeletonPose::from_parts(Arc::clone(&self.description), transforms)
    }

    /// 根据局部姿态计算所有关节的世界变换
    ///
    /// 关节拓扑有序，父关节总是先于子关节更新
    pub fn apply_current_pose(&mut self) {
        for i in 0..self.joints.len() {
            let (done, rest) = self.joints.split_at_mut(i);
            let joint = &mut rest[0];
            joint.compute_local_transform();
            let (parent_world, parent_rotation) = match joint.parent_id() {
                Some(p) => (done[p].local_to_world, done[p].world_rotation),
                None => (Mat4::IDENTITY, Quat::IDENTITY),
            };
            joint.update_world(parent_world, parent_rotation);
        }
    }

    /// 计算蒙皮矩阵
    pub fn compute_skinning_matrices(&mut self) {
        for (out, joint) in self.skinning_matrices.iter_mut().zip(&self.joints) {
            *out = joint.skinning_matrix();
        }
    }

    /// 保存上一帧蒙皮矩阵
    #[inline]
    pub fn copy_last_skinning_matrices(&mut self) {
        self.last_skinning_matrices
            .copy_from_slice(&self.skinning_matrices);
    }

    #[inline]
    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }

    #[inline]
    pub fn last_skinning_matrices(&self) -> &[Mat4] {
        &self.last_skinning_matrices
    }
}
