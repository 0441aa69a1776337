//! 解算器配置
//!
//! SolverConfig 是进程级常量（固定步长、重力等），扁平存放在全局 RwLock 中；
//! RigConfig 是每个 rig 的调参，直接在代码中修改默认值即可。

use glam::Vec3;
use once_cell::sync::Lazy;
use std::sync::RwLock;

use crate::animation::RadiusCurve;

/// 全局解算器配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SolverConfig {
    // ========== 时间 ==========
    /// 固定模拟步长（秒），默认 0.02
    pub fixed_timestep: f64,
    /// 一帧最多追赶的步数，默认 4
    /// 卡顿后不会一次补跑大量 tick
    pub max_catchup_steps: u32,

    // ========== 重力 ==========
    /// 世界重力，默认 (0, -9.81, 0)
    pub gravity: Vec3,

    // ========== 约束 ==========
    /// 根点没有父点时报告的段长，默认 0.1
    pub root_segment_length: f32,

    // ========== 调试 ==========
    /// 是否输出每 tick 调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 0.02,
            max_catchup_steps: 4,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            root_segment_length: 0.1,
            debug_log: false,
        }
    }
}

impl SolverConfig {
    /// 最大追帧时长 = 步长 * 步数
    #[inline]
    pub fn max_catchup_time(&self) -> f64 {
        self.fixed_timestep * self.max_catchup_steps as f64
    }
}

/// 全局配置实例
static SOLVER_CONFIG: Lazy<RwLock<SolverConfig>> = Lazy::new(|| {
    RwLock::new(SolverConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> SolverConfig {
    SOLVER_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SolverConfig) {
    *SOLVER_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SOLVER_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SolverConfig::default();
}

/// 单个 rig 的调参
///
/// 不同材质用不同的一组值（头发轻飘、皮带偏硬）。
#[derive(Debug, Clone)]
pub struct RigConfig {
    // ========== 外力 ==========
    /// 重力倍率 [0, 2]，默认 1.0
    pub gravity_multiplier: f32,
    /// 相对父点速度的摩擦 [0, 1]，默认 0.5
    pub friction: f32,
    /// 空气阻力 [0, 1]，默认 0.4
    /// 同时决定风力的作用强度
    pub air_drag: f32,

    // ========== 约束 ==========
    /// 长度弹性 [0, 1]，默认 0.6（内部取平方）
    pub length_elasticity: f32,
    /// 角度弹性 [0, 1]，默认 0.5（内部取平方）
    pub angle_elasticity: f32,
    /// 弹性软化 [0, 1]，默认 0.5
    /// 越大，点离目标越远时约束越弱
    pub elasticity_soften: f32,

    // ========== 碰撞 ==========
    /// 是否启用碰撞（无碰撞体时同样跳过）
    pub use_collision: bool,
    /// 碰撞半径倍率，默认 1.0
    pub radius_multiplier: f32,
    /// 沿链半径曲线，默认根 1 → 叶 0
    pub radius_curve: RadiusCurve,

    // ========== 混合 ==========
    /// true 使用控制器的动态混合，false 使用静态混合
    pub use_keyed_blend: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            gravity_multiplier: 1.0,
            friction: 0.5,
            air_drag: 0.4,
            length_elasticity: 0.6,
            angle_elasticity: 0.5,
            elasticity_soften: 0.5,
            use_collision: true,
            radius_multiplier: 1.0,
            radius_curve: RadiusCurve::default(),
            use_keyed_blend: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_catchup_time() {
        let config = SolverConfig::default();
        assert!((config.max_catchup_time() - 0.08).abs() < 1e-12);
    }
}
