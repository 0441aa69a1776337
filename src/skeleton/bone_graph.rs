//! 骨骼图 - 从宿主层级构建模拟点
//!
//! 前序遍历宿主节点树：父点永远排在子点前面，所有 pass 都按这个顺序
//! （或逆序）迭代。没有可用子节点的点会补一个虚点，保证链长至少为 2。

use std::collections::HashSet;

use glam::Vec3;

use crate::{Result, RigError};
use super::{
    AnimationState, LocalPose, NodeId, PointFlags, PointId, SimulatedPoint, TransformHierarchy,
};

/// 骨骼图
#[derive(Clone, Debug, Default)]
pub struct BoneGraph {
    points: Vec<SimulatedPoint>,
}

impl BoneGraph {
    /// 从宿主层级构建
    ///
    /// ignored 中的节点连同其整个子树都会被跳过。
    /// projection 是虚点沿最后一段外延的比例（1.0 即等长延伸）。
    pub fn build<H: TransformHierarchy + ?Sized>(
        host: &H,
        root: NodeId,
        ignored: &HashSet<NodeId>,
        projection: f32,
        time: f64,
    ) -> Result<Self> {
        if !host.contains(root) {
            return Err(RigError::UnknownNode(root));
        }

        let mut graph = Self { points: Vec::new() };
        graph.create_points(host, ignored, projection, root, None, time)?;
        graph.compute_normalized_indices();
        Ok(graph)
    }

    fn create_points<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &H,
        ignored: &HashSet<NodeId>,
        projection: f32,
        node: NodeId,
        parent: Option<PointId>,
        time: f64,
    ) -> Result<()> {
        let id = self.push_point(SimulatedPoint::new(
            Some(node),
            parent,
            host.world_position(node),
            host.local_pose(node),
            time,
        ));

        let children: Vec<NodeId> = host
            .children(node)
            .into_iter()
            .filter(|c| !ignored.contains(c))
            .collect();

        if children.is_empty() {
            // 单独一个点无法确定方向
            if parent.is_none() && host.parent(node).is_none() {
                return Err(RigError::SingularPoint(node));
            }
            let position = self.project_from(host, id, projection);
            let mut tip = SimulatedPoint::new(None, Some(id), position, LocalPose::default(), time);
            tip.projection_amount = projection;
            self.push_point(tip);
            return Ok(());
        }

        for child in children {
            self.create_points(host, ignored, projection, child, Some(id), time)?;
        }
        Ok(())
    }

    fn push_point(&mut self, point: SimulatedPoint) -> PointId {
        let id = PointId(self.points.len() as u32);
        if let Some(parent) = point.parent {
            let parent = &mut self.points[parent.index()];
            if parent.child.is_some() {
                parent.flags.insert(PointFlags::BRANCH);
            }
            parent.child = Some(id);
        }
        self.points.push(point);
        id
    }

    /// 根距离 / (根距离 + 主子链长度)
    fn compute_normalized_indices(&mut self) {
        for i in 0..self.points.len() {
            let mut to_root = 0u32;
            let mut cursor = self.points[i].parent;
            while let Some(p) = cursor {
                to_root += 1;
                cursor = self.points[p.index()].parent;
            }

            let mut to_tip = 0u32;
            let mut cursor = self.points[i].child;
            while let Some(c) = cursor {
                to_tip += 1;
                cursor = self.points[c.index()].child;
            }

            let total = to_root + to_tip;
            self.points[i].normalized_index = if total == 0 {
                0.0
            } else {
                to_root as f32 / total as f32
            };
        }
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn points(&self) -> &[SimulatedPoint] {
        &self.points
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [SimulatedPoint] {
        &mut self.points
    }

    #[inline]
    pub fn get(&self, id: PointId) -> Option<&SimulatedPoint> {
        self.points.get(id.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 根点（构建成功后总是第 0 个）
    #[inline]
    pub fn root(&self) -> &SimulatedPoint {
        &self.points[0]
    }

    pub fn virtual_point_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_virtual()).count()
    }

    // ========================================
    // 宿主位置
    // ========================================

    /// 虚点位置：沿最后一个实段外延
    ///
    /// 取父点在祖父坐标系下的位置，乘以 amount 后再放到父点坐标系中。
    fn project_from<H: TransformHierarchy + ?Sized>(
        &self,
        host: &H,
        parent: PointId,
        amount: f32,
    ) -> Vec3 {
        let parent_point = &self.points[parent.index()];
        let Some(parent_node) = parent_point.source else {
            return parent_point.working_position;
        };
        let parent_world = host.world_position(parent_node);
        let frame = parent_point
            .parent
            .and_then(|gp| self.points[gp.index()].source)
            .or_else(|| host.parent(parent_node));
        match frame {
            Some(frame) => {
                let local = host.inverse_transform_point(frame, parent_world);
                host.transform_point(parent_node, local * amount)
            }
            None => parent_world,
        }
    }

    /// 点在宿主中的当前位置（虚点取投影位置）
    pub fn source_position<H: TransformHierarchy + ?Sized>(&self, host: &H, id: PointId) -> Vec3 {
        let point = &self.points[id.index()];
        match (point.source, point.parent) {
            (Some(node), _) => host.world_position(node),
            (None, Some(parent)) => self.project_from(host, parent, point.projection_amount),
            (None, None) => point.working_position,
        }
    }

    // ========================================
    // 每帧准备
    // ========================================

    /// 缓存本帧动画姿态
    ///
    /// 没有被动画驱动的骨骼先恢复到最近一次有效的动画姿态，
    /// 避免把上一帧的物理输出当成新的动画输入。
    pub fn prepare_bones<H: TransformHierarchy + ?Sized>(&mut self, host: &mut H, time: f64) {
        for i in 0..self.points.len() {
            let id = PointId(i as u32);
            if let Some(node) = self.points[i].source {
                let current = host.local_pose(node);
                let point = &self.points[i];
                let (rotation_stale, translation_stale) = match host.animation_state(node) {
                    AnimationState::Driven => (false, false),
                    AnimationState::Undriven => (true, true),
                    AnimationState::Unknown => match point.written_pose {
                        Some(written) => (
                            written.rotation == current.rotation,
                            written.translation == current.translation,
                        ),
                        None => (false, false),
                    },
                };

                let mut restored = current;
                if rotation_stale {
                    restored.rotation = point.last_valid_pose.rotation;
                }
                if translation_stale {
                    restored.translation = point.last_valid_pose.translation;
                }
                if restored != current {
                    host.set_local_pose(node, restored);
                }

                let position = host.world_position(node);
                let point = &mut self.points[i];
                point.animated_signal.set_position(position, time);
                point.last_valid_pose = restored;
            } else {
                let position = self.source_position(&*host, id);
                self.points[i].animated_signal.set_position(position, time);
            }
        }
    }

    // ========================================
    // 传送
    // ========================================

    /// 记录传送前位置；随后由宿主移动角色，再调用 finish_teleport
    pub fn prepare_teleport<H: TransformHierarchy + ?Sized>(&mut self, host: &H) {
        for i in 0..self.points.len() {
            let position = self.source_position(host, PointId(i as u32));
            self.points[i].pre_teleport_position = Some(position);
        }
    }

    /// 丢弃 prepare_teleport 以来的整体位移，保留运动轨迹
    ///
    /// 粒子历史的时间同时前移到 `time - window`，暂停期间不累积外推。
    pub fn finish_teleport<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &H,
        time: f64,
        window: f64,
    ) {
        for i in 0..self.points.len() {
            let position = self.source_position(host, PointId(i as u32));
            let point = &mut self.points[i];
            match point.pre_teleport_position.take() {
                Some(before) => {
                    let offset = position - before;
                    point.animated_signal.flatten_signal(time, position, window);
                    point.particle_signal.offset_signal(offset);
                    point.particle_signal.retime_signal(time - window);
                    point.working_position += offset;
                }
                None => {
                    point.animated_signal.flatten_signal(time, position, window);
                    point.particle_signal.flatten_signal(time, position, window);
                }
            }
        }
    }

    /// 立即对齐动画，丢弃全部运动历史
    pub fn match_animation_instantly<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &H,
        time: f64,
        window: f64,
    ) {
        for i in 0..self.points.len() {
            let position = self.source_position(host, PointId(i as u32));
            let point = &mut self.points[i];
            point.animated_signal.flatten_signal(time, position, window);
            point.particle_signal.flatten_signal(time, position, window);
            point.working_position = position;
            point.pre_teleport_position = None;
        }
    }

    /// 粒子信号归位，并把骨骼恢复到最近一次写回的姿态
    pub fn sample_and_reset<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &mut H,
        time: f64,
        window: f64,
    ) {
        for i in (0..self.points.len()).rev() {
            let position = self.source_position(&*host, PointId(i as u32));
            let point = &mut self.points[i];
            point.particle_signal.flatten_signal(time, position, window);
            if let (Some(node), Some(written)) = (point.source, point.written_pose) {
                host.set_local_pose(node, written);
            }
        }
    }
}
