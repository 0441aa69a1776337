//! 多角色驱动
//!
//! 持有共享碰撞批次，按加入顺序推进所有控制器。

use crate::physics::CollisionBatchContext;
use crate::skeleton::TransformHierarchy;
use super::rig_controller::{FrameContext, RigController};

/// 控制器集合
#[derive(Debug, Default)]
pub struct RigDriver {
    controllers: Vec<RigController>,
    batch: CollisionBatchContext,
}

impl RigDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(batch: CollisionBatchContext) -> Self {
        Self { controllers: Vec::new(), batch }
    }

    /// 加入并启用控制器，返回其下标
    pub fn add(&mut self, mut controller: RigController) -> usize {
        controller.enable(&mut self.batch);
        self.controllers.push(controller);
        self.controllers.len() - 1
    }

    /// 禁用并移除控制器
    pub fn remove<H: TransformHierarchy + ?Sized>(
        &mut self,
        host: &H,
        index: usize,
    ) -> Option<RigController> {
        if index >= self.controllers.len() {
            return None;
        }
        let mut controller = self.controllers.remove(index);
        controller.disable(host, &mut self.batch);
        Some(controller)
    }

    pub fn set_enabled<H: TransformHierarchy + ?Sized>(&mut self, host: &H, index: usize, enabled: bool) {
        let Some(controller) = self.controllers.get_mut(index) else {
            return;
        };
        if enabled {
            controller.enable(&mut self.batch);
        } else {
            controller.disable(host, &mut self.batch);
        }
    }

    #[inline]
    pub fn controllers(&self) -> &[RigController] {
        &self.controllers
    }

    #[inline]
    pub fn controller_mut(&mut self, index: usize) -> Option<&mut RigController> {
        self.controllers.get_mut(index)
    }

    #[inline]
    pub fn batch(&self) -> &CollisionBatchContext {
        &self.batch
    }

    /// 推进一帧，返回所有控制器运行的 tick 总数
    pub fn advance<H: TransformHierarchy + ?Sized>(&mut self, host: &mut H, frame: &FrameContext) -> usize {
        let mut ticks = 0;
        for controller in &mut self.controllers {
            ticks += controller.advance(host, frame, &mut self.batch);
        }
        ticks
    }

    /// 销毁共享代理
    pub fn teardown(&mut self) {
        self.batch.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerSettings;
    use crate::physics::{Collider, RigDescriptor};
    use crate::skeleton::{LocalPose, SkeletonTree};
    use glam::Vec3;

    #[test]
    fn test_shared_proxy_is_disabled_between_frames() {
        let mut tree = SkeletonTree::new();
        let mut driver = RigDriver::new();

        for side in [-1.0f32, 1.0] {
            let root = tree.add_root("root", LocalPose::from_translation(Vec3::new(side, 1.0, 0.0)));
            tree.add_child(root, "tip", LocalPose::from_translation(Vec3::new(0.0, -0.5, 0.0)))
                .unwrap();
            let descriptor = RigDescriptor::new("tail", root)
                .with_colliders(vec![Collider::sphere(Vec3::new(side, 0.0, 0.0), 0.2)]);
            let controller =
                RigController::new(&tree, vec![descriptor], ControllerSettings::default(), 0.0).unwrap();
            driver.add(controller);
        }
        assert_eq!(driver.batch().registered_count(), 2);

        let mut time = 0.0;
        for _ in 0..10 {
            time += 1.0 / 30.0;
            driver.advance(&mut tree, &FrameContext { time, delta_time: 1.0 / 30.0, ..FrameContext::default() });
            assert!(driver.batch().has_proxy());
            assert!(!driver.batch().is_proxy_enabled());
        }

        let removed = driver.remove(&tree, 0);
        assert!(removed.is_some_and(|c| !c.is_enabled()));
        assert_eq!(driver.batch().registered_count(), 1);

        driver.teardown();
        assert!(!driver.batch().has_proxy());
    }
}
