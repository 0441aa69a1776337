//! 控制器模块

mod driver;
mod lod;
mod rig_controller;

pub use driver::RigDriver;
pub use lod::{LodSettings, Viewer};
pub use rig_controller::{ControllerSettings, FrameContext, RigController, RigState};
