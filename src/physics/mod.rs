//! 物理解算模块
//!
//! 每个固定 tick 的顺序：Verlet 积分 → (反向长度) → 角度/长度约束 → (碰撞) → 提交。

pub mod collision;
pub mod config;
pub mod constraint;
mod rig_simulation;
mod signal;
pub mod verlet;
pub mod wind;

pub use collision::{
    BatchTicket, Collider, ColliderShape, CollisionBatchContext, DefaultProxyProvider,
    ProxyProvider, ProxySphere,
};
pub use config::{get_config, reset_config, set_config, RigConfig, SolverConfig};
pub use rig_simulation::{DebugSegment, RigDescriptor, RigSimulation, TickContext};
pub use signal::PositionSignal;
pub use wind::{WindSampler, WindSettings};

use glam::{Quat, Vec3};

/// from → to 的最短旋转；任一向量为零时返回单位旋转
pub(crate) fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(from, to)
}
