//! 骨骼描述
//!
//! 一个网格绑定的静态关节层次。所有其他结构都通过整数索引引用关节，
//! 因此关节只能追加，父关节索引必须小于自身索引（拓扑有序）。

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use super::JointTransform;
use crate::{AnimError, Result};

/// 关节静态信息
#[derive(Clone, Debug)]
pub struct JointInfo {
    /// 关节名称
    pub name: String,
    /// 父关节索引（None 表示根关节）
    pub parent: Option<usize>,
    /// 绑定旋转（相对父关节）
    pub bind_rotation: Quat,
    /// 绑定偏移（相对父关节）
    pub bind_offset: Vec3,
    /// 本地绑定矩阵
    pub local_bind: Mat4,
    /// 全局绑定矩阵
    pub global_bind: Mat4,
    /// 逆绑定矩阵（用于蒙皮）
    pub inverse_bind: Mat4,
}

impl JointInfo {
    /// 绑定姿态下的局部变换
    #[inline]
    pub fn bind_transform(&self) -> JointTransform {
        JointTransform::new(self.bind_rotation, self.bind_offset)
    }
}

/// 骨骼描述（多个实例共享，compute_bind_transforms 之后只读）
#[derive(Clone, Debug, Default)]
pub struct SkeletonDescription {
    name: String,
    joints: Vec<JointInfo>,
    name_to_index: HashMap<String, usize>,
}

impl SkeletonDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            joints: Vec::new(),
            name_to_index: HashMap::new(),
        }
    }

    /// 追加关节，返回关节索引
    pub fn add_joint(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        bind_rotation: Quat,
        bind_offset: Vec3,
    ) -> Result<usize> {
        let name = name.into();
        let index = self.joints.len();
        if let Some(parent) = parent {
            if parent >= index {
                return Err(AnimError::InvalidJointParent { name, index, parent });
            }
        }

        self.name_to_index.entry(name.clone()).or_insert(index);
        self.joints.push(JointInfo {
            name,
            parent,
            bind_rotation,
            bind_offset,
            local_bind: Mat4::from_rotation_translation(bind_rotation, bind_offset),
            global_bind: Mat4::IDENTITY,
            inverse_bind: Mat4::IDENTITY,
        });
        Ok(index)
    }

    /// 计算全局绑定矩阵与逆绑定矩阵
    ///
    /// 关节拓扑有序，一次顺序遍历即可
    pub fn compute_bind_transforms(&mut self) {
        for i in 0..self.joints.len() {
            let local = self.joints[i].local_bind;
            let global = match self.joints[i].parent {
                Some(p) => self.joints[p].global_bind * local,
                None => local,
            };
            self.joints[i].global_bind = global;
            self.joints[i].inverse_bind = global.inverse();
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 通过名称查找关节
    #[inline]
    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn joint(&self, index: usize) -> Option<&JointInfo> {
        self.joints.get(index)
    }

    #[inline]
    pub fn joints(&self) -> &[JointInfo] {
        &self.joints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> SkeletonDescription {
        let mut desc = SkeletonDescription::new("chain");
        let root = desc
            .add_joint("root", None, Quat::IDENTITY, Vec3::new(0.0, 1.0, 0.0))
            .unwrap();
        desc.add_joint("child", Some(root), Quat::IDENTITY, Vec3::new(0.0, 2.0, 0.0))
            .unwrap();
        desc.compute_bind_transforms();
        desc
    }

    #[test]
    fn test_bind_transforms() {
        let desc = chain();
        let child = desc.joint(1).unwrap();
        let position = child.global_bind.col(3).truncate();
        assert!(position.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-6));
        let identity = child.global_bind * child.inverse_bind;
        assert!(identity.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_parent_must_precede_child() {
        let mut desc = SkeletonDescription::new("bad");
        let err = desc.add_joint("a", Some(0), Quat::IDENTITY, Vec3::ZERO);
        assert!(matches!(err, Err(AnimError::InvalidJointParent { index: 0, parent: 0, .. })));
    }

    #[test]
    fn test_find_joint() {
        let desc = chain();
        assert_eq!(desc.find_joint("child"), Some(1));
        assert_eq!(desc.find_joint("missing"), None);
    }
}
