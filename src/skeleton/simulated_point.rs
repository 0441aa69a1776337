//! 模拟点
//!
//! SimulatedPoint 是骨骼链中的一个节点。有宿主节点支撑的是实点，
//! 为叶子补出的是虚点（无宿主节点，只为约束提供"下一个点"）。

use bitflags::bitflags;
use glam::Vec3;

use crate::physics::PositionSignal;
use super::{LocalPose, NodeId};

// ============================================================================
// 点标志
// ============================================================================

bitflags! {
    /// 模拟点标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PointFlags: u32 {
        /// 有宿主节点
        const REAL_SOURCE = 1 << 0;
        /// 链的根（被动画驱动，不参与模拟）
        const ROOT = 1 << 1;
        /// 有多个子点（只有最后一个被记为主子点）
        const BRANCH = 1 << 2;
    }
}

/// 模拟点索引（BoneGraph 内的数组下标）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(pub u32);

impl PointId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// 模拟点
// ============================================================================

/// 模拟点
///
/// - 静态数据：来源节点、父子关系、投影量、归一化索引
/// - 动态数据：动画信号、粒子信号、当前 tick 的工作位置
#[derive(Clone, Debug)]
pub struct SimulatedPoint {
    // ========================================
    // 静态数据（构建后不变）
    // ========================================

    /// 宿主节点（虚点为 None）
    pub source: Option<NodeId>,

    pub flags: PointFlags,

    /// 父点（根为 None）
    pub parent: Option<PointId>,

    /// 主子点（后构建者覆盖）
    pub child: Option<PointId>,

    /// 虚点相对最后一个实父点的外延比例
    pub projection_amount: f32,

    /// 从根 (0) 到叶 (1) 的位置，用于求半径曲线
    pub normalized_index: f32,

    // ========================================
    // 动态数据
    // ========================================

    /// 动画驱动位置的历史
    pub animated_signal: PositionSignal,

    /// 模拟位置的历史
    pub particle_signal: PositionSignal,

    /// 当前 tick 时刻采样的动画位置
    pub fixed_animated_position: Vec3,

    /// 当前 tick 各阶段的中间位置
    pub working_position: Vec3,

    /// 渲染时刻的外推位置（已对齐根）
    pub extrapolated_position: Vec3,

    /// 传送前位置（PrepareTeleport 暂存）
    pub pre_teleport_position: Option<Vec3>,

    /// 最近一次有效的动画本地姿态
    pub(crate) last_valid_pose: LocalPose,

    /// 最近一次写回宿主的本地姿态
    pub(crate) written_pose: Option<LocalPose>,
}

impl SimulatedPoint {
    pub fn new(
        source: Option<NodeId>,
        parent: Option<PointId>,
        position: Vec3,
        local_pose: LocalPose,
        time: f64,
    ) -> Self {
        let mut flags = PointFlags::empty();
        if source.is_some() {
            flags.insert(PointFlags::REAL_SOURCE);
        }
        if parent.is_none() {
            flags.insert(PointFlags::ROOT);
        }
        Self {
            source,
            flags,
            parent,
            child: None,
            projection_amount: 1.0,
            normalized_index: 0.0,
            animated_signal: PositionSignal::new(position, time),
            particle_signal: PositionSignal::new(position, time),
            fixed_animated_position: position,
            working_position: position,
            extrapolated_position: position,
            pre_teleport_position: None,
            last_valid_pose: local_pose,
            written_pose: None,
        }
    }

    #[inline]
    pub fn has_real_source(&self) -> bool {
        self.flags.contains(PointFlags::REAL_SOURCE)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.flags.contains(PointFlags::ROOT)
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        !self.has_real_source()
    }

    #[inline]
    pub fn is_branch(&self) -> bool {
        self.flags.contains(PointFlags::BRANCH)
    }

    /// 角度约束是否适用（根与零投影虚点跳过）
    #[inline]
    pub fn takes_angle_constraint(&self) -> bool {
        !self.is_root() && (self.has_real_source() || self.projection_amount != 0.0)
    }
}
