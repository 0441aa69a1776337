//! 内存骨骼树
//!
//! TransformHierarchy 的简单实现，世界矩阵沿父链实时计算。
//! 用于测试与 demo，也可作为宿主对接前的缓冲层。

use glam::Mat4;

use crate::{Result, RigError};
use super::{AnimationState, LocalPose, NodeId, TransformHierarchy};

#[derive(Clone, Debug)]
struct SkeletonNode {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: LocalPose,
    animation: AnimationState,
}

/// 骨骼树
#[derive(Clone, Debug, Default)]
pub struct SkeletonTree {
    nodes: Vec<SkeletonNode>,
}

impl SkeletonTree {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// 添加根节点
    pub fn add_root(&mut self, name: impl Into<String>, local: LocalPose) -> NodeId {
        self.push(name.into(), None, local)
    }

    /// 添加子节点
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        local: LocalPose,
    ) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(RigError::UnknownNode(parent));
        }
        let id = self.push(name.into(), Some(parent), local);
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    fn push(&mut self, name: String, parent: Option<NodeId>, local: LocalPose) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SkeletonNode {
            name,
            parent,
            children: Vec::new(),
            local,
            animation: AnimationState::Unknown,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.index()).map(|n| n.name.as_str())
    }

    /// 按名称查找节点
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId(i as u32))
    }

    /// 设置显式动画标志（宿主已知哪些骨骼本帧被动画驱动时使用）
    pub fn set_animation_state(&mut self, node: NodeId, state: AnimationState) {
        if let Some(n) = self.nodes.get_mut(node.index()) {
            n.animation = state;
        }
    }
}

impl TransformHierarchy for SkeletonTree {
    fn contains(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index()).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.index())
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn local_pose(&self, node: NodeId) -> LocalPose {
        self.nodes
            .get(node.index())
            .map(|n| n.local)
            .unwrap_or_default()
    }

    fn set_local_pose(&mut self, node: NodeId, pose: LocalPose) {
        if let Some(n) = self.nodes.get_mut(node.index()) {
            n.local = pose;
        }
    }

    fn world_matrix(&self, node: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(n) = self.nodes.get(id.index()) else {
                break;
            };
            matrix = n.local.to_matrix() * matrix;
            current = n.parent;
        }
        matrix
    }

    fn animation_state(&self, node: NodeId) -> AnimationState {
        self.nodes
            .get(node.index())
            .map(|n| n.animation)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_world_position_follows_parent_chain() {
        let mut tree = SkeletonTree::new();
        let root = tree.add_root("root", LocalPose::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        let child = tree
            .add_child(root, "child", LocalPose::from_translation(Vec3::new(0.0, -1.0, 0.0)))
            .unwrap();

        assert!(approx(tree.world_position(child), Vec3::new(1.0, -1.0, 0.0)));

        let turned = LocalPose::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(1.0, 0.0, 0.0),
        );
        tree.set_local_pose(root, turned);
        assert!(approx(tree.world_position(child), Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_set_world_position_round_trips_through_parent() {
        let mut tree = SkeletonTree::new();
        let root = tree.add_root(
            "root",
            LocalPose::from_rotation_translation(Quat::from_rotation_y(0.7), Vec3::new(0.0, 2.0, 0.0)),
        );
        let child = tree
            .add_child(root, "child", LocalPose::from_translation(Vec3::X))
            .unwrap();

        let target = Vec3::new(0.3, 1.0, -0.4);
        tree.set_world_position(child, target);
        assert!(approx(tree.world_position(child), target));

        let rotation = Quat::from_rotation_x(0.4);
        tree.set_world_rotation(child, rotation);
        assert!(tree.world_rotation(child).angle_between(rotation) < 1e-4);
    }

    #[test]
    fn test_lookup_by_name() {
        let mut tree = SkeletonTree::new();
        let root = tree.add_root("hips", LocalPose::default());
        let tail = tree.add_child(root, "tail_0", LocalPose::default()).unwrap();

        assert_eq!(tree.find_by_name("tail_0"), Some(tail));
        assert_eq!(tree.name(root), Some("hips"));
        assert_eq!(tree.find_by_name("ear"), None);
        assert_eq!(tree.name(NodeId(9)), None);
    }

    #[test]
    fn test_add_child_to_unknown_parent_fails() {
        let mut tree = SkeletonTree::new();
        let err = tree.add_child(NodeId(3), "orphan", LocalPose::default());
        assert!(matches!(err, Err(RigError::UnknownNode(NodeId(3)))));
    }
}
