//! 碰撞
//!
//! 所有 rig 共用一个代理碰撞球：每个点把它移到自己的位置、换上自己的半径，
//! 逐个碰撞体求穿透并推出。代理由 CollisionBatchContext 持有，
//! 一帧内第一个开始 pass 的 rig 启用它，最后一个结束的 rig 关闭它。

use std::collections::HashSet;

use glam::{Quat, Vec3};

use crate::animation::Curve;
use crate::skeleton::SimulatedPoint;
use crate::Result;
use super::RigConfig;

const GEOM_EPSILON: f32 = 1e-6;

// ============================================================================
// 碰撞体
// ============================================================================

/// 碰撞体形状（局部空间）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    /// 沿局部 Y 轴；half_height 不含两端半球
    Capsule { radius: f32, half_height: f32 },
    OrientedBox { half_extents: Vec3 },
}

/// 带世界位姿的碰撞体
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: ColliderShape,
    pub position: Vec3,
    pub rotation: Quat,
}

impl Collider {
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self { shape: ColliderShape::Sphere { radius }, position: center, rotation: Quat::IDENTITY }
    }

    pub fn capsule(center: Vec3, rotation: Quat, radius: f32, half_height: f32) -> Self {
        Self { shape: ColliderShape::Capsule { radius, half_height }, position: center, rotation }
    }

    pub fn oriented_box(center: Vec3, rotation: Quat, half_extents: Vec3) -> Self {
        Self { shape: ColliderShape::OrientedBox { half_extents }, position: center, rotation }
    }

    /// 球 (center, radius) 与碰撞体的穿透
    ///
    /// 返回 (推出方向, 深度)；不相交时为 None。
    pub fn penetration(&self, center: Vec3, radius: f32) -> Option<(Vec3, f32)> {
        match self.shape {
            ColliderShape::Sphere { radius: r } => sphere_sphere(center, radius, self.position, r),
            ColliderShape::Capsule { radius: r, half_height } => {
                let axis = self.rotation * Vec3::Y * half_height;
                let a = self.position - axis;
                let b = self.position + axis;
                let closest = closest_point_on_segment(center, a, b);
                sphere_sphere(center, radius, closest, r)
            }
            ColliderShape::OrientedBox { half_extents } => {
                sphere_box(center, radius, self.position, self.rotation, half_extents)
            }
        }
    }
}

fn sphere_sphere(center: Vec3, radius: f32, other: Vec3, other_radius: f32) -> Option<(Vec3, f32)> {
    let diff = center - other;
    let dist = diff.length();
    let depth = radius + other_radius - dist;
    if depth <= 0.0 {
        return None;
    }
    let normal = if dist > GEOM_EPSILON { diff / dist } else { Vec3::Y };
    Some((normal, depth))
}

fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= GEOM_EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

fn sphere_box(
    center: Vec3,
    radius: f32,
    box_position: Vec3,
    box_rotation: Quat,
    half: Vec3,
) -> Option<(Vec3, f32)> {
    let local = box_rotation.inverse() * (center - box_position);
    let closest = local.clamp(-half, half);
    let diff = local - closest;
    let dist = diff.length();

    if dist > GEOM_EPSILON {
        let depth = radius - dist;
        if depth <= 0.0 {
            return None;
        }
        return Some((box_rotation * (diff / dist), depth));
    }

    // 球心在盒内：沿最浅的面推出
    let mut min_pen = f32::MAX;
    let mut normal_local = Vec3::X;
    for i in 0..3 {
        let pen_pos = half[i] - local[i];
        let pen_neg = half[i] + local[i];
        if pen_pos < min_pen {
            min_pen = pen_pos;
            normal_local = Vec3::ZERO;
            normal_local[i] = 1.0;
        }
        if pen_neg < min_pen {
            min_pen = pen_neg;
            normal_local = Vec3::ZERO;
            normal_local[i] = -1.0;
        }
    }
    Some((box_rotation * normal_local, min_pen + radius))
}

// ============================================================================
// 代理碰撞球
// ============================================================================

/// 共享的代理碰撞球
#[derive(Debug, Clone, Default)]
pub struct ProxySphere {
    radius: f32,
    enabled: bool,
}

impl ProxySphere {
    /// 新建的代理默认关闭
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 以 position 为球心求与碰撞体的穿透
    pub fn compute_penetration(&self, position: Vec3, collider: &Collider) -> Option<(Vec3, f32)> {
        if self.radius <= 0.0 {
            return None;
        }
        collider.penetration(position, self.radius)
    }
}

/// 代理创建接口（宿主可能需要在自身物理世界中创建对象）
pub trait ProxyProvider {
    fn create_proxy(&mut self) -> Result<ProxySphere>;
}

/// 直接创建纯数据代理
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProxyProvider;

impl ProxyProvider for DefaultProxyProvider {
    fn create_proxy(&mut self) -> Result<ProxySphere> {
        Ok(ProxySphere::new())
    }
}

// ============================================================================
// 批次上下文
// ============================================================================

/// 注册凭据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchTicket(u64);

/// 跨 rig 共享的碰撞批次状态
///
/// remaining：-1 表示空闲；否则为本帧已完成 pass 的 rig 数。
pub struct CollisionBatchContext {
    provider: Box<dyn ProxyProvider>,
    proxy: Option<ProxySphere>,
    registered: HashSet<BatchTicket>,
    next_ticket: u64,
    remaining: i64,
    creation_blocked: bool,
}

impl Default for CollisionBatchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollisionBatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionBatchContext")
            .field("proxy", &self.proxy)
            .field("registered", &self.registered.len())
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl CollisionBatchContext {
    pub fn new() -> Self {
        Self::with_provider(Box::new(DefaultProxyProvider))
    }

    pub fn with_provider(provider: Box<dyn ProxyProvider>) -> Self {
        Self {
            provider,
            proxy: None,
            registered: HashSet::new(),
            next_ticket: 0,
            remaining: -1,
            creation_blocked: false,
        }
    }

    /// 注册一个 rig 控制器
    pub fn register(&mut self) -> BatchTicket {
        let ticket = BatchTicket(self.next_ticket);
        self.next_ticket += 1;
        self.registered.insert(ticket);
        ticket
    }

    /// 注销；重复注销无副作用
    pub fn unregister(&mut self, ticket: BatchTicket) {
        self.registered.remove(&ticket);
    }

    #[inline]
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    #[inline]
    pub fn has_proxy(&self) -> bool {
        self.proxy.is_some()
    }

    #[inline]
    pub fn is_proxy_enabled(&self) -> bool {
        self.proxy.as_ref().is_some_and(ProxySphere::is_enabled)
    }

    /// 本帧第一个 rig 开始时启用代理
    pub fn start_pass(&mut self) {
        let count = self.registered.len() as i64;
        if self.remaining <= -1 || self.remaining >= count {
            // 新的一帧，允许重试创建
            self.creation_blocked = false;
            if let Some(proxy) = self.try_get() {
                proxy.enabled = true;
            }
            self.remaining = 0;
        }
    }

    /// 最后一个 rig 结束时关闭代理
    pub fn finished_pass(&mut self) {
        self.remaining += 1;
        if self.remaining >= self.registered.len() as i64 {
            if let Some(proxy) = self.proxy.as_mut() {
                proxy.enabled = false;
            }
            self.remaining = -1;
        }
    }

    /// 取得代理，不存在时惰性创建
    ///
    /// 创建失败记一次警告，本帧不再重试。
    pub fn try_get(&mut self) -> Option<&mut ProxySphere> {
        if self.proxy.is_none() && !self.creation_blocked {
            match self.provider.create_proxy() {
                Ok(proxy) => {
                    log::info!("[CollisionProxy] 代理碰撞球已创建");
                    self.proxy = Some(proxy);
                }
                Err(e) => {
                    log::warn!("[CollisionProxy] 创建代理失败，本帧跳过碰撞: {}", e);
                    self.creation_blocked = true;
                }
            }
        }
        self.proxy.as_mut()
    }

    /// 销毁代理（宿主卸载场景时调用）
    pub fn teardown(&mut self) {
        if self.proxy.take().is_some() {
            log::info!("[CollisionProxy] 代理碰撞球已销毁");
        }
        self.remaining = -1;
    }
}

// ============================================================================
// 碰撞 pass
// ============================================================================

/// 碰撞 pass：非根点逐个推出所有碰撞体
pub fn collision_pass(
    points: &mut [SimulatedPoint],
    config: &RigConfig,
    colliders: &[Collider],
    proxy: &mut ProxySphere,
) {
    for point in points.iter_mut() {
        if point.is_root() {
            continue;
        }
        let radius = config.radius_multiplier * config.radius_curve.value(point.normalized_index);
        if radius <= 0.0 {
            continue;
        }
        proxy.set_radius(radius);
        for collider in colliders {
            if let Some((direction, depth)) = proxy.compute_penetration(point.working_position, collider) {
                point.working_position += direction * depth;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::RadiusCurve;
    use crate::skeleton::{LocalPose, PointId};
    use crate::RigError;

    struct UnavailableProxyProvider;

    impl ProxyProvider for UnavailableProxyProvider {
        fn create_proxy(&mut self) -> Result<ProxySphere> {
            Err(RigError::ProxyUnavailable("no physics scene".to_string()))
        }
    }

    struct FlakyProvider {
        failures_left: u32,
        attempts: u32,
    }

    impl ProxyProvider for FlakyProvider {
        fn create_proxy(&mut self) -> Result<ProxySphere> {
            self.attempts += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(RigError::ProxyUnavailable("scene loading".to_string()));
            }
            Ok(ProxySphere::new())
        }
    }

    #[test]
    fn test_sphere_penetration() {
        let collider = Collider::sphere(Vec3::ZERO, 1.0);
        let (dir, depth) = collider.penetration(Vec3::new(1.2, 0.0, 0.0), 0.5).unwrap();
        assert!((dir - Vec3::X).length() < 1e-6);
        assert!((depth - 0.3).abs() < 1e-6);
        assert!(collider.penetration(Vec3::new(2.0, 0.0, 0.0), 0.5).is_none());
    }

    #[test]
    fn test_capsule_side_and_cap() {
        let collider = Collider::capsule(Vec3::ZERO, Quat::IDENTITY, 0.5, 1.0);
        let (dir, depth) = collider.penetration(Vec3::new(0.6, 0.5, 0.0), 0.2).unwrap();
        assert!((dir - Vec3::X).length() < 1e-6);
        assert!((depth - 0.1).abs() < 1e-5);

        let (dir, _) = collider.penetration(Vec3::new(0.0, 1.6, 0.0), 0.2).unwrap();
        assert!((dir - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_box_outside_and_inside() {
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let collider = Collider::oriented_box(Vec3::ZERO, rotation, Vec3::new(1.0, 1.0, 0.25));

        // 旋转后局部 Z 指向世界 X
        let (dir, depth) = collider.penetration(Vec3::new(0.35, 0.0, 0.0), 0.2).unwrap();
        assert!((dir - Vec3::X).length() < 1e-5);
        assert!((depth - 0.1).abs() < 1e-5);

        // 球心在盒内，沿最浅方向推出并加上半径
        let (dir, depth) = collider.penetration(Vec3::new(0.0, 0.9, 0.0), 0.2).unwrap();
        assert!((dir - Vec3::Y).length() < 1e-5);
        assert!((depth - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_barrier_enables_for_first_and_disables_after_last() {
        let mut batch = CollisionBatchContext::new();
        let a = batch.register();
        let _b = batch.register();

        batch.start_pass();
        assert!(batch.is_proxy_enabled());
        batch.finished_pass();
        batch.start_pass();
        assert!(batch.is_proxy_enabled());
        batch.finished_pass();
        assert!(!batch.is_proxy_enabled());

        // 下一帧重新启用
        batch.start_pass();
        assert!(batch.is_proxy_enabled());
        batch.finished_pass();
        batch.unregister(a);
        batch.unregister(a);
        assert_eq!(batch.registered_count(), 1);

        // 只剩一个 rig：一次 start/finish 即完成整批
        batch.start_pass();
        batch.finished_pass();
        assert!(!batch.is_proxy_enabled());
    }

    #[test]
    fn test_failed_provider_retries_once_per_frame() {
        let mut batch = CollisionBatchContext::with_provider(Box::new(FlakyProvider {
            failures_left: 1,
            attempts: 0,
        }));
        batch.register();

        batch.start_pass();
        assert!(!batch.has_proxy());
        assert!(batch.try_get().is_none());
        batch.finished_pass();

        batch.start_pass();
        assert!(batch.has_proxy());
        assert!(batch.is_proxy_enabled());
        batch.finished_pass();

        batch.teardown();
        assert!(!batch.has_proxy());
    }

    #[test]
    fn test_unavailable_provider_never_yields_proxy() {
        let mut batch = CollisionBatchContext::with_provider(Box::new(UnavailableProxyProvider));
        batch.register();
        for _ in 0..3 {
            batch.start_pass();
            assert!(batch.try_get().is_none());
            batch.finished_pass();
        }
    }

    #[test]
    fn test_collision_pass_pushes_out_and_skips_root() {
        let root = SimulatedPoint::new(None, None, Vec3::ZERO, LocalPose::default(), 0.0);
        let mut tip = SimulatedPoint::new(None, Some(PointId(0)), Vec3::ZERO, LocalPose::default(), 0.0);
        tip.working_position = Vec3::new(0.0, -0.9, 0.0);
        tip.normalized_index = 1.0;
        let mut points = vec![root, tip];

        let config = RigConfig { radius_curve: RadiusCurve::constant(0.1), ..RigConfig::default() };
        let colliders = [Collider::sphere(Vec3::new(0.0, -1.0, 0.0), 0.5)];
        let mut proxy = ProxySphere::new();

        collision_pass(&mut points, &config, &colliders, &mut proxy);

        assert_eq!(points[0].working_position, Vec3::ZERO);
        let d = points[1].working_position.distance(colliders[0].position);
        assert!((d - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_zero_radius_points_are_skipped() {
        let root = SimulatedPoint::new(None, None, Vec3::ZERO, LocalPose::default(), 0.0);
        let mut tip = SimulatedPoint::new(None, Some(PointId(0)), Vec3::ZERO, LocalPose::default(), 0.0);
        tip.normalized_index = 1.0;
        let mut points = vec![root, tip];

        // 默认曲线在叶子处为 0
        let colliders = [Collider::sphere(Vec3::ZERO, 0.5)];
        collision_pass(&mut points, &RigConfig::default(), &colliders, &mut ProxySphere::new());

        assert_eq!(points[1].working_position, Vec3::ZERO);
    }
}
