//! 约束求解
//!
//! 弹性参数在内部取平方，让滑块在低端更细腻。
//! 所有修正都是向目标点按弹性插值，不做迭代求解。

use glam::Vec3;

use crate::skeleton::{PointId, SimulatedPoint};
use super::from_to_rotation;

const LENGTH_EPSILON: f32 = 1e-6;

/// 约束参数
#[derive(Debug, Clone, Copy)]
pub struct ConstraintParams {
    pub length_elasticity: f32,
    pub angle_elasticity: f32,
    pub elasticity_soften: f32,
    /// 根点报告的段长
    pub root_segment_length: f32,
}

/// 当前 tick 的动画段长
#[inline]
pub fn segment_length(points: &[SimulatedPoint], id: PointId, root_length: f32) -> f32 {
    let point = &points[id.index()];
    match point.parent {
        Some(parent) => point
            .fixed_animated_position
            .distance(points[parent.index()].fixed_animated_position),
        None => root_length,
    }
}

/// 软化系数：离目标越近修正越弱
#[inline]
fn soften_error(distance: f32, length: f32, soften: f32) -> f32 {
    if length <= LENGTH_EPSILON {
        return 1.0;
    }
    (distance / length).clamp(0.0, 1.0).powf(soften * 2.0)
}

/// 反向长度 pass（叶 → 根）
///
/// 只在有碰撞时运行：把点拉向主子点，让碰撞推开的叶子能带动上游。
pub fn backward_length_pass(points: &mut [SimulatedPoint], params: &ConstraintParams) {
    let elasticity = params.length_elasticity * params.length_elasticity * 0.5;
    for i in (0..points.len()).rev() {
        if points[i].is_root() {
            continue;
        }
        let Some(child) = points[i].child else {
            continue;
        };
        let child_working = points[child.index()].working_position;
        let rest = segment_length(points, child, params.root_segment_length);

        let point = &mut points[i];
        let direction = (point.working_position - child_working).normalize_or_zero();
        let target = child_working + direction * rest;
        point.working_position = point.working_position.lerp(target, elasticity);
    }
}

/// 角度 + 长度约束 pass（根 → 叶）
pub fn constraint_pass(points: &mut [SimulatedPoint], params: &ConstraintParams) {
    let angle_elasticity = params.angle_elasticity * params.angle_elasticity;
    let length_elasticity = params.length_elasticity * params.length_elasticity;

    for i in 0..points.len() {
        let Some(parent) = points[i].parent else {
            continue;
        };
        let id = PointId(i as u32);
        let mut position = points[i].working_position;

        if points[i].takes_angle_constraint() {
            position = constrain_angle(points, id, parent, position, angle_elasticity, params);
        }
        position = constrain_length(points, id, parent, position, length_elasticity, params);

        points[i].working_position = position;
    }
}

/// 保持与父段之间的动画夹角
///
/// 用 "祖父→父" 的动画方向到模拟方向的旋转，把 "祖父→自己" 的动画向量转到
/// 模拟空间得到目标点。父点是根时以父点为中心镜像出一个祖父。
fn constrain_angle(
    points: &[SimulatedPoint],
    id: PointId,
    parent: PointId,
    position: Vec3,
    elasticity: f32,
    params: &ConstraintParams,
) -> Vec3 {
    let point = &points[id.index()];
    let parent_point = &points[parent.index()];
    let animated = point.fixed_animated_position;
    let parent_animated = parent_point.fixed_animated_position;

    let (grandparent_simulated, grandparent_animated) = match parent_point.parent {
        Some(gp) => {
            let gp = &points[gp.index()];
            (gp.working_position, gp.fixed_animated_position)
        }
        None => {
            let mirrored = parent_animated + (parent_animated - animated);
            (mirrored, mirrored)
        }
    };

    let parent_aim_animated = parent_animated - grandparent_animated;
    let parent_aim_simulated = parent_point.working_position - grandparent_simulated;
    let rotation = from_to_rotation(parent_aim_animated, parent_aim_simulated);

    let target = grandparent_simulated + rotation * (animated - grandparent_animated);
    let length = segment_length(points, id, params.root_segment_length);
    let error = soften_error(position.distance(target), length, params.elasticity_soften);

    position.lerp(target, elasticity * error)
}

/// 保持与父点之间的动画段长
fn constrain_length(
    points: &[SimulatedPoint],
    id: PointId,
    parent: PointId,
    position: Vec3,
    elasticity: f32,
    params: &ConstraintParams,
) -> Vec3 {
    let parent_working = points[parent.index()].working_position;
    let rest = segment_length(points, id, params.root_segment_length);
    let direction = (position - parent_working).normalize_or_zero();
    position.lerp(parent_working + direction * rest, elasticity)
}
