//! 绳索摆动演示
//!
//! 用法: cargo run --features demo --bin chain_demo [段数]
//! RUST_LOG=debug 可查看控制器日志。

use dynamic_rig::{
    Collider, ControllerSettings, FrameContext, LocalPose, RigConfig, RigController,
    RigDescriptor, RigDriver, SkeletonTree, TransformHierarchy,
};
use glam::Vec3;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let segments: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(8);

    let mut tree = SkeletonTree::new();
    let root = tree.add_root("rope_root", LocalPose::from_translation(Vec3::new(0.0, 2.0, 0.0)));
    let mut last = root;
    for i in 0..segments {
        match tree.add_child(
            last,
            format!("rope_{}", i),
            LocalPose::from_translation(Vec3::new(0.0, -0.15, 0.0)),
        ) {
            Ok(node) => last = node,
            Err(e) => {
                log::error!("创建骨骼失败: {}", e);
                return;
            }
        }
    }

    log::info!(
        "绳索: {} 段, 末端 '{}'",
        segments,
        tree.name(last).unwrap_or("rope_root")
    );

    let descriptor = RigDescriptor::new("rope", root)
        .with_colliders(vec![Collider::sphere(Vec3::new(0.3, 1.2, 0.0), 0.25)])
        .with_config(RigConfig { friction: 0.3, air_drag: 0.2, ..RigConfig::default() });

    let controller = match RigController::new(&tree, vec![descriptor], ControllerSettings::default(), 0.0) {
        Ok(controller) => controller,
        Err(e) => {
            log::error!("创建控制器失败: {}", e);
            return;
        }
    };

    let mut driver = RigDriver::new();
    driver.add(controller);

    // 60 fps，根在 x 方向来回摆动
    let delta_time = 1.0 / 60.0;
    let mut time = 0.0;
    for frame in 0..600 {
        time += delta_time;
        let sway = (time * 2.0).sin() as f32 * 0.5;
        tree.set_local_pose(root, LocalPose::from_translation(Vec3::new(sway, 2.0, 0.0)));

        let ticks = driver.advance(
            &mut tree,
            &FrameContext { time, delta_time, ..FrameContext::default() },
        );

        if frame % 30 == 0 {
            let tip = tree.world_position(last);
            log::info!(
                "frame {:>4} t={:.2}s ticks={} tip=({:.3}, {:.3}, {:.3})",
                frame,
                time,
                ticks,
                tip.x,
                tip.y,
                tip.z
            );
        }
    }

    driver.teardown();
}
