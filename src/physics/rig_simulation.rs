//! 单个 rig 的模拟
//!
//! 一个 rig = 一条(或一棵)骨骼链 + 它的碰撞体 + 调参。
//! 控制器按固定步长调用 step，渲染帧调用 derive_final_solve 和 pose。

use std::collections::HashSet;

use glam::Vec3;

use crate::skeleton::{BoneGraph, NodeId, PointId, TransformHierarchy};
use crate::{Result, RigError};
use super::collision::{self, Collider, CollisionBatchContext};
use super::constraint::{self, ConstraintParams};
use super::verlet::{self, IntegrationParams};
use super::{from_to_rotation, RigConfig, WindSampler};

/// rig 描述（构建参数）
#[derive(Debug, Clone)]
pub struct RigDescriptor {
    pub name: String,
    pub root: Option<NodeId>,
    /// 这些节点及其子树不参与模拟
    pub ignored: HashSet<NodeId>,
    pub colliders: Vec<Collider>,
    pub config: RigConfig,
    /// 虚点外延比例，默认 1.0；为 0 时虚点与父点重合且不受角度约束
    pub projection: f32,
}

impl RigDescriptor {
    pub fn new(name: impl Into<String>, root: NodeId) -> Self {
        Self {
            name: name.into(),
            root: Some(root),
            ignored: HashSet::new(),
            colliders: Vec::new(),
            config: RigConfig::default(),
            projection: 1.0,
        }
    }

    pub fn with_ignored(mut self, ignored: impl IntoIterator<Item = NodeId>) -> Self {
        self.ignored.extend(ignored);
        self
    }

    pub fn with_colliders(mut self, colliders: Vec<Collider>) -> Self {
        self.colliders = colliders;
        self
    }

    pub fn with_config(mut self, config: RigConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_projection(mut self, projection: f32) -> Self {
        self.projection = projection;
        self
    }
}

/// 单 tick 的外部输入
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// 本 tick 对应的时刻
    pub time: f64,
    pub timestep: f32,
    pub gravity: Vec3,
    pub root_segment_length: f32,
    /// 已合成的风向量
    pub wind: Vec3,
    pub wind_sampler: &'a WindSampler,
    pub debug_log: bool,
}

/// 调试线段（模拟 / 动画各一条）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugSegment {
    pub simulated: (Vec3, Vec3),
    pub animated: (Vec3, Vec3),
}

/// 单个 rig 的模拟状态
#[derive(Debug, Clone)]
pub struct RigSimulation {
    name: String,
    root_node: NodeId,
    graph: BoneGraph,
    ignored: HashSet<NodeId>,
    projection: f32,
    colliders: Vec<Collider>,
    config: RigConfig,
}

impl RigSimulation {
    /// 构建
    pub fn build<H: TransformHierarchy + ?Sized>(
        host: &H,
        descriptor: RigDescriptor,
        time: f64,
    ) -> Result<Self> {
        let RigDescriptor { name, root, ignored, colliders, config, projection } = descriptor;
        let root_node = root.ok_or_else(|| RigError::MissingRoot { rig: name.clone() })?;
        let graph = BoneGraph::build(host, root_node, &ignored, projection, time)?;

        log::info!(
            "[DynamicRig] rig '{}' 构建完成: {} 个点 ({} 个虚点), {} 个碰撞体",
            name,
            graph.len(),
            graph.virtual_point_count(),
            colliders.len()
        );

        Ok(Self { name, root_node, graph, ignored, projection, colliders, config })
    }

    /// 丢弃全部状态，从宿主当前姿态重新构建
    pub fn rebuild<H: TransformHierarchy + ?Sized>(&mut self, host: &H, time: f64) -> Result<()> {
        self.graph = BoneGraph::build(host, self.root_node, &self.ignored, self.projection, time)?;
        log::debug!("[DynamicRig] rig '{}' 已重建", self.name);
        Ok(())
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root_node(&self) -> NodeId {
        self.root_node
    }

    #[inline]
    pub fn graph(&self) -> &BoneGraph {
        &self.graph
    }

    #[inline]
    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut RigConfig {
        &mut self.config
    }

    #[inline]
    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    /// 宿主每帧更新碰撞体位姿
    #[inline]
    pub fn colliders_mut(&mut self) -> &mut Vec<Collider> {
        &mut self.colliders
    }

    /// 是否需要碰撞相关的 pass
    #[inline]
    pub fn needs_collisions(&self) -> bool {
        self.config.use_collision && !self.colliders.is_empty()
    }

    // ========================================
    // 固定步
    // ========================================

    /// 推进一个固定 tick
    pub fn step(&mut self, tick: &TickContext<'_>, batch: &mut CollisionBatchContext) {
        let collide = self.needs_collisions();
        let config = &self.config;

        let integration = IntegrationParams {
            timestep: tick.timestep,
            gravity: tick.gravity,
            gravity_multiplier: config.gravity_multiplier,
            friction: config.friction,
            air_drag: config.air_drag,
        };
        let constraints = ConstraintParams {
            length_elasticity: config.length_elasticity,
            angle_elasticity: config.angle_elasticity,
            elasticity_soften: config.elasticity_soften,
            root_segment_length: tick.root_segment_length,
        };

        let points = self.graph.points_mut();
        let wind = tick.wind_sampler.rig_wind(tick.wind, tick.time);

        verlet::integrate(points, &integration, tick.time, wind, tick.wind_sampler);

        if collide {
            constraint::backward_length_pass(points, &constraints);
        }

        constraint::constraint_pass(points, &constraints);

        if collide {
            if let Some(proxy) = batch.try_get() {
                collision::collision_pass(points, config, &self.colliders, proxy);
            }
        }

        // 提交
        for point in points.iter_mut() {
            point.particle_signal.set_position(point.working_position, tick.time);
        }

        if tick.debug_log {
            if let Some(tip) = points.last() {
                log::trace!(
                    "[DynamicRig] '{}' t={:.3} tip=({:.4}, {:.4}, {:.4})",
                    self.name,
                    tick.time,
                    tip.working_position.x,
                    tip.working_position.y,
                    tip.working_position.z
                );
            }
        }
    }

    // ========================================
    // 渲染帧
    // ========================================

    /// 外推到 time，并把模拟根对齐到宿主根
    pub fn derive_final_solve<H: TransformHierarchy + ?Sized>(&mut self, host: &H, time: f64) {
        let anchor = host.world_position(self.root_node);
        let points = self.graph.points_mut();
        let Some(root) = points.first() else {
            return;
        };
        let offset = anchor - root.particle_signal.sample_position(time);
        for point in points.iter_mut() {
            point.extrapolated_position = offset + point.particle_signal.sample_position(time);
        }
    }

    /// 按混合系数把模拟结果写回宿主
    ///
    /// 根只写旋转，其余实点写位置与旋转。写回的本地姿态被记下，
    /// 下一帧用于判断骨骼是否仍被动画驱动。
    pub fn pose<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &mut H,
        time: f64,
        dynamic_blend: f32,
        static_blend: f32,
    ) {
        let blend = if self.config.use_keyed_blend { dynamic_blend } else { static_blend };

        for i in 0..self.graph.len() {
            let point = &self.graph.points()[i];
            let (Some(node), Some(child)) = (point.source, point.child) else {
                continue;
            };
            let is_root = point.is_root();
            let position_blend = point
                .animated_signal
                .sample_position(time)
                .lerp(point.extrapolated_position, blend);
            let child_point = &self.graph.points()[child.index()];
            let child_blend = child_point
                .animated_signal
                .sample_position(time)
                .lerp(child_point.extrapolated_position, blend);

            if !is_root {
                host.set_world_position(node, position_blend);
            }

            let child_position = self.graph.source_position(&*host, child);
            let animated_aim = child_position - host.world_position(node);
            let simulated_aim = child_blend - position_blend;
            let rotation = from_to_rotation(animated_aim, simulated_aim);
            host.set_world_rotation(node, rotation * host.world_rotation(node));

            let written = host.local_pose(node);
            self.graph.points_mut()[i].written_pose = Some(written);
        }
    }

    /// 调试线段（根之外每个点一条）
    pub fn debug_segments(&self) -> Vec<DebugSegment> {
        let points = self.graph.points();
        points
            .iter()
            .filter_map(|point| {
                let parent = &points[point.parent?.index()];
                Some(DebugSegment {
                    simulated: (parent.extrapolated_position, point.extrapolated_position),
                    animated: (parent.fixed_animated_position, point.fixed_animated_position),
                })
            })
            .collect()
    }

    // ========================================
    // 委托给骨骼图
    // ========================================

    pub fn prepare_bones<H: TransformHierarchy + ?Sized>(&mut self, host: &mut H, time: f64) {
        self.graph.prepare_bones(host, time);
    }

    pub fn prepare_teleport<H: TransformHierarchy + ?Sized>(&mut self, host: &H) {
        self.graph.prepare_teleport(host);
    }

    pub fn finish_teleport<H: TransformHierarchy + ?Sized>(&mut self, host: &H, time: f64, window: f64) {
        self.graph.finish_teleport(host, time, window);
    }

    pub fn match_animation_instantly<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &H,
        time: f64,
        window: f64,
    ) {
        self.graph.match_animation_instantly(host, time, window);
    }

    pub fn sample_and_reset<H: TransformHierarchy + ?Sized>(&mut self, host: &mut H, time: f64, window: f64) {
        self.graph.sample_and_reset(host, time, window);
    }

    /// 当前粒子位置（按点顺序）
    pub fn particle_positions(&self) -> Vec<Vec3> {
        self.graph.points().iter().map(|p| p.particle_signal.current()).collect()
    }

    /// 指定点的粒子位置
    pub fn particle_position(&self, id: PointId) -> Option<Vec3> {
        self.graph.get(id).map(|p| p.particle_signal.current())
    }
}
