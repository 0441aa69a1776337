//! 骨骼系统 - 外部层级抽象与模拟点
//!
//! 核心设计思想：
//! - TransformHierarchy: 宿主提供的节点树（位置/旋转读写）
//! - SimulatedPoint: 模拟点（实点对应宿主节点，虚点补在叶子后面）
//! - BoneGraph: 模拟点的扁平数组（前序排列，父节点先于子节点）

mod bone_graph;
mod simulated_point;
mod tree;

pub use bone_graph::BoneGraph;
pub use simulated_point::{PointFlags, PointId, SimulatedPoint};
pub use tree::SkeletonTree;

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 宿主节点 ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 节点本地变换（相对父节点）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalPose {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for LocalPose {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl LocalPose {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self { translation, rotation, scale: Vec3::ONE }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }
}

/// 节点本帧是否被动画驱动
///
/// 宿主能明确告知时使用 Driven / Undriven；
/// Unknown 时解算器退回到与上次写入姿态比较的推断方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AnimationState {
    Driven,
    Undriven,
    #[default]
    Unknown,
}

// ============================================================================
// 宿主层级
// ============================================================================

/// 外部变换层级
///
/// 解算器只通过这个 trait 读取动画姿态并写回结果。
/// 只需实现 local/world 矩阵与父子关系，其余方法有默认实现。
pub trait TransformHierarchy {
    fn contains(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// 子节点（按层级顺序）
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn local_pose(&self, node: NodeId) -> LocalPose;

    fn set_local_pose(&mut self, node: NodeId, pose: LocalPose);

    /// 节点到世界的变换
    fn world_matrix(&self, node: NodeId) -> Mat4;

    fn animation_state(&self, _node: NodeId) -> AnimationState {
        AnimationState::Unknown
    }

    #[inline]
    fn world_position(&self, node: NodeId) -> Vec3 {
        self.world_matrix(node).w_axis.truncate()
    }

    #[inline]
    fn world_rotation(&self, node: NodeId) -> Quat {
        let (_, rotation, _) = self.world_matrix(node).to_scale_rotation_translation();
        rotation
    }

    /// 本地点 → 世界点
    #[inline]
    fn transform_point(&self, node: NodeId, local: Vec3) -> Vec3 {
        self.world_matrix(node).transform_point3(local)
    }

    /// 世界点 → 本地点
    #[inline]
    fn inverse_transform_point(&self, node: NodeId, world: Vec3) -> Vec3 {
        self.world_matrix(node).inverse().transform_point3(world)
    }

    fn set_world_position(&mut self, node: NodeId, position: Vec3) {
        let parent_world = self
            .parent(node)
            .map(|p| self.world_matrix(p))
            .unwrap_or(Mat4::IDENTITY);
        let mut pose = self.local_pose(node);
        pose.translation = parent_world.inverse().transform_point3(position);
        self.set_local_pose(node, pose);
    }

    fn set_world_rotation(&mut self, node: NodeId, rotation: Quat) {
        let parent_rotation = self
            .parent(node)
            .map(|p| self.world_rotation(p))
            .unwrap_or(Quat::IDENTITY);
        let mut pose = self.local_pose(node);
        pose.rotation = (parent_rotation.inverse() * rotation).normalize();
        self.set_local_pose(node, pose);
    }
}
