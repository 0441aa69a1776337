//! Verlet 积分
//!
//! 速度不单独存储，由粒子信号的前后两次采样隐式给出。
//! 点自身速度拆成两部分：父点带来的惯性 (受空气阻力衰减) 与
//! 相对父点的局部速度 (受摩擦衰减)。两者都为 0 时退化为经典 Verlet。

use glam::Vec3;

use crate::skeleton::SimulatedPoint;
use super::WindSampler;

/// 单 tick 积分参数
#[derive(Debug, Clone, Copy)]
pub struct IntegrationParams {
    pub timestep: f32,
    pub gravity: Vec3,
    pub gravity_multiplier: f32,
    pub friction: f32,
    pub air_drag: f32,
}

/// 下一个物理位置
#[inline]
pub fn next_physics_position(
    current: Vec3,
    previous: Vec3,
    local_velocity: Vec3,
    params: &IntegrationParams,
) -> Vec3 {
    let dt = params.timestep;
    let inherited = current - previous - local_velocity;
    current
        + inherited * (1.0 - params.air_drag)
        + local_velocity * (1.0 - params.friction)
        + params.gravity * (params.gravity_multiplier * dt * dt)
}

/// 积分 pass（前序）
///
/// 根直接取动画位置；其余点从上一次提交的粒子历史积分，再叠加风力。
pub fn integrate(
    points: &mut [SimulatedPoint],
    params: &IntegrationParams,
    time: f64,
    wind: Vec3,
    wind_sampler: &WindSampler,
) {
    for i in 0..points.len() {
        let fixed = points[i].animated_signal.sample_position(time);
        points[i].fixed_animated_position = fixed;

        let Some(parent) = points[i].parent else {
            points[i].working_position = fixed;
            continue;
        };

        let parent_delta = points[parent.index()].particle_signal.delta();
        let point = &mut points[i];
        let signal = point.particle_signal;
        let local_velocity = signal.delta() - parent_delta;

        let mut next = next_physics_position(signal.current(), signal.previous(), local_velocity, params);
        let wind = wind_sampler.point_wind(wind, signal.current(), time);
        next += wind * (params.timestep * params.air_drag);

        point.working_position = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::PointId;
    use crate::skeleton::LocalPose;

    fn params() -> IntegrationParams {
        IntegrationParams {
            timestep: 0.02,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            gravity_multiplier: 1.0,
            friction: 0.0,
            air_drag: 0.0,
        }
    }

    #[test]
    fn test_undamped_step_is_classic_verlet() {
        let p = params();
        let current = Vec3::new(0.0, 1.0, 0.0);
        let previous = Vec3::new(0.1, 1.0, 0.0);
        let next = next_physics_position(current, previous, Vec3::new(0.3, 0.0, 0.0), &p);
        let expected = current * 2.0 - previous + p.gravity * (p.timestep * p.timestep);
        assert!((next - expected).length() < 1e-6);
    }

    #[test]
    fn test_full_drag_and_friction_stop_motion() {
        let p = IntegrationParams { friction: 1.0, air_drag: 1.0, gravity: Vec3::ZERO, ..params() };
        let next = next_physics_position(Vec3::ONE, Vec3::ZERO, Vec3::splat(0.5), &p);
        assert!((next - Vec3::ONE).length() < 1e-6);
    }

    #[test]
    fn test_root_snaps_to_animation() {
        let mut root = SimulatedPoint::new(None, None, Vec3::ZERO, LocalPose::default(), 0.0);
        root.animated_signal.set_position(Vec3::new(0.0, 0.0, 2.0), 1.0);
        let mut child = SimulatedPoint::new(None, Some(PointId(0)), Vec3::new(0.0, -1.0, 0.0), LocalPose::default(), 0.0);
        child.particle_signal.set_position(Vec3::new(0.0, -1.0, 0.0), 0.02);
        let mut points = vec![root, child];

        integrate(&mut points, &params(), 0.5, Vec3::ZERO, &WindSampler::steady());

        assert!((points[0].working_position - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-6);
        assert_eq!(points[0].working_position, points[0].fixed_animated_position);
        // 子点静止起步，只受一步重力
        let drop = points[1].working_position.y + 1.0;
        assert!((drop + 9.81 * 0.0004).abs() < 1e-6);
    }

    /// 静止的 root + 一个子点，子点在 (x, -1, 0)
    fn resting_pair(x: f32) -> Vec<SimulatedPoint> {
        let root = SimulatedPoint::new(None, None, Vec3::ZERO, LocalPose::default(), 0.0);
        let child = SimulatedPoint::new(None, Some(PointId(0)), Vec3::new(x, -1.0, 0.0), LocalPose::default(), 0.0);
        vec![root, child]
    }

    #[test]
    fn test_wind_displacement_scales_with_air_drag() {
        let p = IntegrationParams { gravity: Vec3::ZERO, air_drag: 0.5, ..params() };
        let mut points = resting_pair(0.0);
        let wind = Vec3::new(2.0, 0.0, -1.0);

        integrate(&mut points, &p, 0.02, wind, &WindSampler::steady());

        let moved = points[1].working_position - Vec3::new(0.0, -1.0, 0.0);
        assert!((moved - wind * (0.02 * 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_zero_air_drag_ignores_wind() {
        let p = IntegrationParams { gravity: Vec3::ZERO, ..params() };
        let mut points = resting_pair(0.0);

        integrate(&mut points, &p, 0.02, Vec3::new(50.0, 0.0, 0.0), &WindSampler::steady());

        assert_eq!(points[1].working_position, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_position_delay_samples_wind_at_point() {
        let settings = crate::physics::WindSettings {
            variation: true,
            position_based_delay: true,
            seed: Some(12.5),
            ..Default::default()
        };
        let sampler = WindSampler::new(&settings);
        let p = IntegrationParams { gravity: Vec3::ZERO, air_drag: 1.0, ..params() };
        let wind = Vec3::new(3.0, 0.0, 0.0);

        for x in [0.0, 0.4, 1.3] {
            let mut points = resting_pair(x);
            integrate(&mut points, &p, 0.3, wind, &sampler);

            let start = Vec3::new(x, -1.0, 0.0);
            let expected = sampler.point_wind(wind, start, 0.3) * 0.02;
            let moved = points[1].working_position - start;
            assert!((moved - expected).length() < 1e-6);
            assert!(moved.length() <= wind.length() * 0.02 + 1e-6);
        }
    }
}
