//! 运行时关节
//!
//! Joint 是 Skeleton 的基本单元，保存当前帧的局部姿态和缓存的世界变换。
//! 变换计算：local_to_world = parent.local_to_world * local_to_parent

use glam::{Mat4, Quat, Vec3};

use super::{JointInfo, JointTransform};

/// 运行时关节
#[derive(Clone, Debug)]
pub struct Joint {
    // ========================================
    // 静态数据（初始化后不变）
    // ========================================

    /// 关节索引
    pub(crate) internal_id: usize,

    /// 父关节索引（None 表示根关节）
    pub(crate) parent_index: Option<usize>,

    /// 逆绑定矩阵（用于蒙皮）
    pub(crate) inverse_bind: Mat4,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 局部旋转
    pub rotation: Quat,

    /// 局部偏移
    pub offset: Vec3,

    /// 本地变换矩阵 (local_to_parent)
    pub local_to_parent: Mat4,

    /// 全局变换矩阵 (local_to_world)
    pub local_to_world: Mat4,

    /// 世界空间旋转（缓存）
    pub world_rotation: Quat,
}

impl Joint {
    /// 从关节描述创建，初始为绑定姿态
    pub fn from_info(index: usize, info: &JointInfo) -> Self {
        Self {
            internal_id: index,
            parent_index: info.parent,
            inverse_bind: info.inverse_bind,
            rotation: info.bind_rotation,
            offset: info.bind_offset,
            local_to_parent: info.local_bind,
            local_to_world: info.global_bind,
            world_rotation: Quat::IDENTITY,
        }
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn link_id(&self) -> usize {
        self.internal_id
    }

    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        self.parent_index
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index.is_none()
    }

    /// 获取世界位置
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.local_to_world.col(3).truncate()
    }

    /// 当前局部姿态
    #[inline]
    pub fn local_pose(&self) -> JointTransform {
        JointTransform::new(self.rotation, self.offset)
    }

    #[inline]
    pub fn set_local_pose(&mut self, pose: JointTransform) {
        self.rotation = pose.rotation;
        self.offset = pose.offset;
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 计算本地变换 (local_to_parent)
    #[inline]
    pub fn compute_local_transform(&mut self) {
        self.local_to_parent = Mat4::from_rotation_translation(self.rotation, self.offset);
    }

    /// 根据父关节的世界变换更新自身
    #[inline]
    pub(crate) fn update_world(&mut self, parent_to_world: Mat4, parent_rotation: Quat) {
        self.local_to_world = parent_to_world * self.local_to_parent;
        self.world_rotation = (parent_rotation * self.rotation).normalize();
    }

    /// 获取蒙皮矩阵
    /// skinning_matrix = local_to_world * inverse_bind
    #[inline]
    pub fn skinning_matrix(&self) -> Mat4 {
        self.local_to_world * self.inverse_bind
    }
}
