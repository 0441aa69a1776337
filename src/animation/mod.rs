//! 动画曲线

mod curve;

pub use curve::{Curve, CurveKey, RadiusCurve};
