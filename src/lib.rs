//! 骨骼链二次运动解算器
//!
//! 基于 Verlet 积分，为头发、绑带、触手等骨骼链提供物理次级运动。
//! 宿主每帧提供动画姿态，解算器按固定步长模拟后把结果混合回骨骼。
//!
//! 模块划分：
//! - skeleton: 外部层级抽象、模拟点、骨骼图构建
//! - physics: 配置、位置信号、积分、约束、碰撞、风
//! - animation: 半径曲线
//! - controller: LOD、控制器、多 rig 驱动

pub mod animation;
pub mod controller;
pub mod physics;
pub mod skeleton;

pub use animation::{CurveKey, RadiusCurve};
pub use controller::{
    ControllerSettings, FrameContext, LodSettings, RigController, RigDriver, RigState, Viewer,
};
pub use physics::{
    Collider, ColliderShape, CollisionBatchContext, PositionSignal, ProxyProvider, ProxySphere,
    RigConfig, RigDescriptor, RigSimulation, SolverConfig, WindSettings,
};
pub use skeleton::{
    AnimationState, BoneGraph, LocalPose, NodeId, PointId, SimulatedPoint, SkeletonTree,
    TransformHierarchy,
};

use thiserror::Error;

/// 错误类型
#[derive(Debug, Error)]
pub enum RigError {
    /// rig 未指定根骨骼
    #[error("rig '{rig}' has no root bone; disable or remove it if it is unused")]
    MissingRoot { rig: String },

    /// 控制器没有任何 rig
    #[error("controller has no rigs")]
    NoRigs,

    /// 根骨骼既没有父节点也没有子节点
    #[error("node {0:?} has no parent and no children; a single point cannot be simulated")]
    SingularPoint(NodeId),

    /// 宿主层级中不存在该节点
    #[error("node {0:?} is not part of the hierarchy")]
    UnknownNode(NodeId),

    /// 共享碰撞代理创建失败（临时性错误）
    #[error("collision proxy unavailable: {0}")]
    ProxyUnavailable(String),
}

pub type Result<T> = std::result::Result<T, RigError>;
