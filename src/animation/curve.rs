//! 关键帧曲线
//!
//! 三次 Hermite 插值，范围外取端点值。用于沿骨骼链的碰撞半径。

/// 曲线 trait
pub trait Curve {
    fn value(&self, v: f32) -> f32;
}

/// 曲线关键帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
    /// 进入切线（斜率）
    pub in_tangent: f32,
    /// 离开切线（斜率）
    pub out_tangent: f32,
}

impl CurveKey {
    /// 平切线关键帧
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value, in_tangent: 0.0, out_tangent: 0.0 }
    }

    pub const fn with_tangents(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self { time, value, in_tangent, out_tangent }
    }
}

/// 半径曲线
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusCurve {
    /// 按 time 升序
    keys: Vec<CurveKey>,
}

impl Default for RadiusCurve {
    /// 根 1 → 叶 0
    fn default() -> Self {
        Self::new(vec![CurveKey::new(0.0, 1.0), CurveKey::new(1.0, 0.0)])
    }
}

impl RadiusCurve {
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// 常数曲线
    pub fn constant(value: f32) -> Self {
        Self::new(vec![CurveKey::new(0.0, value)])
    }

    /// 直线曲线（切线等于斜率）
    pub fn linear(from: f32, to: f32) -> Self {
        let slope = to - from;
        Self::new(vec![
            CurveKey::with_tangents(0.0, from, slope, slope),
            CurveKey::with_tangents(1.0, to, slope, slope),
        ])
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// 求值
    pub fn evaluate(&self, time: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        // 找到所在区间
        let upper = self.keys.partition_point(|k| k.time <= time);
        let k0 = &self.keys[upper - 1];
        let k1 = &self.keys[upper];
        let span = k1.time - k0.time;
        if span <= f32::EPSILON {
            return k1.value;
        }

        let s = (time - k0.time) / span;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * k0.value + h10 * span * k0.out_tangent + h01 * k1.value + h11 * span * k1.in_tangent
    }
}

impl Curve for RadiusCurve {
    #[inline]
    fn value(&self, v: f32) -> f32 {
        self.evaluate(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_curve_endpoints_and_midpoint() {
        let curve = RadiusCurve::default();
        assert_eq!(curve.evaluate(0.0), 1.0);
        assert_eq!(curve.evaluate(1.0), 0.0);
        // 平切线 → smoothstep
        assert!((curve.evaluate(0.5) - 0.5).abs() < 1e-6);
        assert!(curve.evaluate(0.25) > 0.75);
    }

    #[test]
    fn test_clamped_outside_range() {
        let curve = RadiusCurve::linear(0.2, 0.8);
        assert_eq!(curve.evaluate(-3.0), 0.2);
        assert_eq!(curve.evaluate(4.0), 0.8);
        assert!((curve.evaluate(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unsorted_keys_and_empty_curve() {
        let curve = RadiusCurve::new(vec![CurveKey::new(1.0, 2.0), CurveKey::new(0.0, 4.0)]);
        assert_eq!(curve.keys()[0].time, 0.0);
        assert_eq!(curve.value(0.0), 4.0);

        let empty = RadiusCurve::new(Vec::new());
        assert_eq!(empty.evaluate(0.5), 0.0);
        assert_eq!(RadiusCurve::constant(0.3).evaluate(0.9), 0.3);
    }
}
