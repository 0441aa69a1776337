//! 风力
//!
//! 风 = rig 自身常量风 + 环境风 * 缩放。
//! 开启 variation 后用 Perlin 噪声调制强度，避免恒定风看起来很假；
//! position_based_delay 再按点位置错开相位，让风像一阵阵扫过链条。

use glam::Vec3;

/// 风力设置
#[derive(Debug, Clone)]
pub struct WindSettings {
    /// rig 自身的常量风
    pub constant: Vec3,
    /// 环境风（每帧由宿主传入）的缩放，默认 1.0
    pub environment_scale: f32,
    /// 是否用噪声调制风力强度，默认 false
    pub variation: bool,
    /// 是否按点位置错开噪声相位，默认 false
    pub position_based_delay: bool,
    /// 噪声随时间推进的速度，默认 1.0
    pub variation_speed: f32,
    /// 噪声种子（None 时随机生成）
    pub seed: Option<f32>,
}

impl Default for WindSettings {
    fn default() -> Self {
        Self {
            constant: Vec3::ZERO,
            environment_scale: 1.0,
            variation: false,
            position_based_delay: false,
            variation_speed: 1.0,
            seed: None,
        }
    }
}

impl WindSettings {
    /// 合成本帧风向量
    #[inline]
    pub fn resolve(&self, environment: Vec3) -> Vec3 {
        self.constant + environment * self.environment_scale
    }
}

/// 风力采样器（持有已确定的种子）
#[derive(Debug, Clone)]
pub struct WindSampler {
    variation: bool,
    position_based_delay: bool,
    speed: f32,
    seed: f32,
}

impl WindSampler {
    pub fn new(settings: &WindSettings) -> Self {
        let seed = settings
            .seed
            .unwrap_or_else(|| rand::random::<f32>() * 1000.0);
        Self {
            variation: settings.variation,
            position_based_delay: settings.position_based_delay,
            speed: settings.variation_speed,
            seed,
        }
    }

    /// 不做任何调制的采样器
    pub fn steady() -> Self {
        Self { variation: false, position_based_delay: false, speed: 0.0, seed: 0.0 }
    }

    #[inline]
    pub fn seed(&self) -> f32 {
        self.seed
    }

    /// rig 级强度调制
    pub fn rig_wind(&self, wind: Vec3, time: f64) -> Vec3 {
        if !self.variation {
            return wind;
        }
        let phase = (self.speed as f64 * time) as f32;
        wind * perlin_noise(self.seed + phase, self.seed)
    }

    /// 点级强度调制（按位置错开相位）
    pub fn point_wind(&self, wind: Vec3, position: Vec3, time: f64) -> Vec3 {
        if !(self.variation && self.position_based_delay) {
            return wind;
        }
        let offset = position.dot(wind);
        let phase = (self.speed as f64 * time) as f32;
        wind * perlin_noise(self.seed + offset * 100.0 + phase, self.seed)
    }
}

// ============================================================================
// 梯度噪声
// ============================================================================

#[inline]
fn hash(x: i32, y: i32) -> u32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343) ^ (y as u32).wrapping_mul(0xd816_3841);
    h ^= h >> 13;
    h = h.wrapping_mul(0x5bd1_e995);
    h ^ (h >> 15)
}

#[inline]
fn gradient(h: u32, dx: f32, dy: f32) -> f32 {
    match h & 7 {
        0 => dx + dy,
        1 => -dx + dy,
        2 => dx - dy,
        3 => -dx - dy,
        4 => dx,
        5 => -dx,
        6 => dy,
        _ => -dy,
    }
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// 二维 Perlin 噪声，输出 [0, 1]
pub fn perlin_noise(x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let ix = x0 as i32;
    let iy = y0 as i32;
    let fx = x - x0;
    let fy = y - y0;

    let n00 = gradient(hash(ix, iy), fx, fy);
    let n10 = gradient(hash(ix + 1, iy), fx - 1.0, fy);
    let n01 = gradient(hash(ix, iy + 1), fx, fy - 1.0);
    let n11 = gradient(hash(ix + 1, iy + 1), fx - 1.0, fy - 1.0);

    let u = fade(fx);
    let v = fade(fy);
    let nx0 = n00 + (n10 - n00) * u;
    let nx1 = n01 + (n11 - n01) * u;
    let n = nx0 + (nx1 - nx0) * v;

    (n * 0.5 + 0.5).clamp(0.0, 1.0)
}
