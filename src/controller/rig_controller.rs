//! 控制器 - 一个角色的所有 rig
//!
//! 每个渲染帧：LOD 判定 → 缓存动画 → 固定步追帧 → 外推 → 混合写回。
//! 固定步的累积时间有上限，卡顿后只补跑有限的 tick。

use glam::Vec3;

use crate::physics::{
    self, BatchTicket, CollisionBatchContext, RigDescriptor, RigSimulation, SolverConfig,
    TickContext, WindSampler, WindSettings,
};
use crate::skeleton::TransformHierarchy;
use crate::{Result, RigError};
use super::lod::{LodSettings, Viewer};

/// 控制器设置
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// 动态混合 [0, 1]，默认 0.9
    pub blend: f32,
    /// 关闭 use_keyed_blend 的 rig 使用的混合，默认 0.9
    pub static_blend: f32,
    pub lod: LodSettings,
    pub wind: WindSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            blend: 0.9,
            static_blend: 0.9,
            lod: LodSettings::default(),
            wind: WindSettings::default(),
        }
    }
}

/// 每帧输入
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameContext {
    /// 当前时刻（秒）
    pub time: f64,
    /// 距上一帧的时间（秒）
    pub delta_time: f64,
    pub viewer: Option<Viewer>,
    /// 环境风
    pub wind: Vec3,
}

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigState {
    /// LOD 判定失败，不模拟
    Idle,
    /// 正在模拟
    Active,
}

/// rig 控制器
#[derive(Debug)]
pub struct RigController {
    rigs: Vec<RigSimulation>,
    settings: ControllerSettings,
    solver: SolverConfig,
    wind_sampler: WindSampler,
    accumulation: f64,
    was_lod_active: bool,
    dirty_from_enable: bool,
    ticket: Option<BatchTicket>,
}

impl RigController {
    /// 构建所有 rig
    ///
    /// 解算器配置在构建时读取一次。
    pub fn new<H: TransformHierarchy + ?Sized>(
        host: &H,
        descriptors: Vec<RigDescriptor>,
        settings: ControllerSettings,
        time: f64,
    ) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(RigError::NoRigs);
        }

        let rigs = descriptors
            .into_iter()
            .map(|descriptor| RigSimulation::build(host, descriptor, time))
            .collect::<Result<Vec<_>>>()?;

        let wind_sampler = WindSampler::new(&settings.wind);
        log::info!(
            "[DynamicRig] 控制器已创建: {} 个 rig, wind seed {:.3}",
            rigs.len(),
            wind_sampler.seed()
        );

        Ok(Self {
            rigs,
            settings,
            solver: physics::get_config(),
            wind_sampler,
            accumulation: 0.0,
            was_lod_active: true,
            dirty_from_enable: false,
            ticket: None,
        })
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn rigs(&self) -> &[RigSimulation] {
        &self.rigs
    }

    #[inline]
    pub fn rigs_mut(&mut self) -> &mut [RigSimulation] {
        &mut self.rigs
    }

    pub fn rig(&self, name: &str) -> Option<&RigSimulation> {
        self.rigs.iter().find(|rig| rig.name() == name)
    }

    pub fn rig_mut(&mut self, name: &str) -> Option<&mut RigSimulation> {
        self.rigs.iter_mut().find(|rig| rig.name() == name)
    }

    #[inline]
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut ControllerSettings {
        &mut self.settings
    }

    #[inline]
    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.ticket.is_some()
    }

    #[inline]
    pub fn state(&self) -> RigState {
        if self.was_lod_active {
            RigState::Active
        } else {
            RigState::Idle
        }
    }

    fn window(&self) -> f64 {
        self.solver.max_catchup_time()
    }

    fn anchor<H: TransformHierarchy + ?Sized>(&self, host: &H) -> Vec3 {
        self.rigs
            .first()
            .map(|rig| host.world_position(rig.root_node()))
            .unwrap_or(Vec3::ZERO)
    }

    // ========================================
    // 启用 / 禁用
    // ========================================

    /// 加入碰撞批次；下一帧从当前动画重新开始
    pub fn enable(&mut self, batch: &mut CollisionBatchContext) {
        if self.ticket.is_none() {
            self.ticket = Some(batch.register());
            self.dirty_from_enable = true;
        }
    }

    /// 退出碰撞批次，记录当前位置供重新启用时平移
    pub fn disable<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &H,
        batch: &mut CollisionBatchContext,
    ) {
        if let Some(ticket) = self.ticket.take() {
            batch.unregister(ticket);
            self.prepare_teleport(host);
        }
    }

    // ========================================
    // 传送
    // ========================================

    pub fn prepare_teleport<H: TransformHierarchy + ?Sized>(&mut self, host: &H) {
        log::debug!("[DynamicRig] 准备传送: 记录 {} 个 rig 的位置", self.rigs.len());
        for rig in &mut self.rigs {
            rig.prepare_teleport(host);
        }
    }

    pub fn finish_teleport<H: TransformHierarchy + ?Sized>(&mut self, host: &H, time: f64) {
        let window = self.window();
        log::debug!("[DynamicRig] 完成传送: t={:.3}", time);
        for rig in &mut self.rigs {
            rig.finish_teleport(host, time, window);
        }
    }

    pub fn match_animation_instantly<H: TransformHierarchy + ?Sized>(&mut self, host: &H, time: f64) {
        let window = self.window();
        for rig in &mut self.rigs {
            rig.match_animation_instantly(host, time, window);
        }
    }

    /// 粒子归位并恢复最近一次写回的姿态
    pub fn sample_and_reset<H: TransformHierarchy + ?Sized>(&mut self, host: &mut H, time: f64) {
        let window = self.window();
        for rig in &mut self.rigs {
            rig.sample_and_reset(host, time, window);
        }
    }

    /// 调参变化后重建所有 rig
    pub fn reinitialize<H: TransformHierarchy + ?Sized>(&mut self, host: &H, time: f64) -> Result<()> {
        self.solver = physics::get_config();
        self.wind_sampler = WindSampler::new(&self.settings.wind);
        self.accumulation = 0.0;
        for rig in &mut self.rigs {
            rig.rebuild(host, time)?;
        }
        Ok(())
    }

    // ========================================
    // 每帧
    // ========================================

    /// 推进一帧，返回本帧运行的固定 tick 数
    pub fn advance<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &mut H,
        frame: &FrameContext,
        batch: &mut CollisionBatchContext,
    ) -> usize {
        if !self.is_enabled() {
            return 0;
        }

        let anchor = self.anchor(&*host);
        let viewer = frame.viewer.as_ref();

        if !self.settings.lod.check_active(anchor, viewer) {
            if self.was_lod_active {
                log::debug!("[DynamicRig] LOD 失效，暂停模拟");
                self.prepare_teleport(&*host);
            }
            batch.start_pass();
            batch.finished_pass();
            self.was_lod_active = false;
            return 0;
        }

        if !self.was_lod_active {
            log::debug!("[DynamicRig] LOD 恢复，平移历史后继续模拟");
            self.finish_teleport(&*host, frame.time);
        }

        batch.start_pass();

        for rig in &mut self.rigs {
            rig.prepare_bones(host, frame.time);
        }

        if self.dirty_from_enable {
            self.finish_teleport(&*host, frame.time);
            self.dirty_from_enable = false;
        }

        let ticks = self.run_fixed_steps(frame, batch);

        let fade = self.settings.lod.fade(anchor, viewer);
        let dynamic_blend = self.settings.blend * fade;
        let static_blend = self.settings.static_blend;
        for rig in &mut self.rigs {
            rig.derive_final_solve(&*host, frame.time);
            rig.pose(host, frame.time, dynamic_blend, static_blend);
        }

        batch.finished_pass();
        self.was_lod_active = true;
        ticks
    }

    fn run_fixed_steps(&mut self, frame: &FrameContext, batch: &mut CollisionBatchContext) -> usize {
        let timestep = self.solver.fixed_timestep;
        self.accumulation = (self.accumulation + frame.delta_time).min(self.window());

        let wind = self.settings.wind.resolve(frame.wind);
        let mut ticks = 0;
        while self.accumulation > timestep {
            self.accumulation -= timestep;
            let tick = TickContext {
                time: frame.time - self.accumulation,
                timestep: timestep as f32,
                gravity: self.solver.gravity,
                root_segment_length: self.solver.root_segment_length,
                wind,
                wind_sampler: &self.wind_sampler,
                debug_log: self.solver.debug_log,
            };
            for rig in &mut self.rigs {
                rig.step(&tick, batch);
            }
            ticks += 1;
        }
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{LocalPose, NodeId, SkeletonTree};

    fn rope() -> (SkeletonTree, Vec<NodeId>) {
        let mut tree = SkeletonTree::new();
        let root = tree.add_root("root", LocalPose::from_translation(Vec3::new(0.0, 2.0, 0.0)));
        let a = tree
            .add_child(root, "a", LocalPose::from_translation(Vec3::new(0.0, -0.5, 0.0)))
            .unwrap();
        let b = tree
            .add_child(a, "b", LocalPose::from_translation(Vec3::new(0.0, -0.5, 0.0)))
            .unwrap();
        (tree, vec![root, a, b])
    }

    fn frame(time: f64, delta_time: f64) -> FrameContext {
        FrameContext { time, delta_time, ..FrameContext::default() }
    }

    #[test]
    fn test_no_rigs_is_rejected() {
        let (tree, _) = rope();
        let err = RigController::new(&tree, Vec::new(), ControllerSettings::default(), 0.0);
        assert!(matches!(err, Err(RigError::NoRigs)));
    }

    #[test]
    fn test_disabled_controller_does_nothing() {
        let (mut tree, nodes) = rope();
        let mut controller = RigController::new(
            &tree,
            vec![RigDescriptor::new("rope", nodes[0])],
            ControllerSettings::default(),
            0.0,
        )
        .unwrap();
        let mut batch = CollisionBatchContext::new();
        assert_eq!(controller.advance(&mut tree, &frame(0.1, 0.1), &mut batch), 0);
    }

    #[test]
    fn test_catchup_is_bounded() {
        let (mut tree, nodes) = rope();
        let mut controller = RigController::new(
            &tree,
            vec![RigDescriptor::new("rope", nodes[0])],
            ControllerSettings::default(),
            0.0,
        )
        .unwrap();
        let mut batch = CollisionBatchContext::new();
        controller.enable(&mut batch);

        // 卡顿一秒也最多补跑 max_catchup_steps 个 tick
        let ticks = controller.advance(&mut tree, &frame(1.0, 1.0), &mut batch);
        let max = controller.solver_config().max_catchup_steps as usize;
        assert!(ticks >= 1 && ticks <= max);
        assert_eq!(controller.state(), RigState::Active);
    }

    #[test]
    fn test_lod_without_viewer_goes_idle() {
        let (mut tree, nodes) = rope();
        let settings = ControllerSettings {
            lod: LodSettings { enabled: true, ..LodSettings::default() },
            ..ControllerSettings::default()
        };
        let mut controller =
            RigController::new(&tree, vec![RigDescriptor::new("rope", nodes[0])], settings, 0.0)
                .unwrap();
        let mut batch = CollisionBatchContext::new();
        controller.enable(&mut batch);

        assert_eq!(controller.advance(&mut tree, &frame(0.1, 0.1), &mut batch), 0);
        assert_eq!(controller.state(), RigState::Idle);
        // 批次计数仍然闭合
        assert!(!batch.is_proxy_enabled());
    }
}
