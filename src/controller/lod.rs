//! LOD 判定
//!
//! 远处或视野外的角色不模拟。fade 在阈值内侧的一段距离里
//! 把动态混合逐渐压到 0，避免越过阈值时突然切换。

use glam::{Mat4, Vec3};

/// 观察者（通常是主相机）
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub position: Vec3,
    /// 视图投影矩阵；None 时视野判定总是失败
    pub view_projection: Option<Mat4>,
}

impl Viewer {
    pub fn at(position: Vec3) -> Self {
        Self { position, view_projection: None }
    }

    pub fn with_view_projection(mut self, view_projection: Mat4) -> Self {
        self.view_projection = Some(view_projection);
        self
    }

    /// 点是否在视口内且位于相机前方
    pub fn sees(&self, point: Vec3) -> bool {
        let Some(view_projection) = self.view_projection else {
            return false;
        };
        let clip = view_projection * point.extend(1.0);
        if clip.w <= 0.0 {
            return false;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        (-1.0..=1.0).contains(&ndc_x) && (-1.0..=1.0).contains(&ndc_y)
    }
}

/// LOD 设置
#[derive(Debug, Clone, Copy)]
pub struct LodSettings {
    /// 总开关，默认 false（总是模拟）
    pub enabled: bool,
    /// 按距离判定，默认 true
    pub distance_based: bool,
    /// 按视野判定，默认 false
    pub view_based: bool,
    /// 模拟距离阈值，默认 5.0
    pub distance: f32,
    /// 淡出宽度（阈值内侧），默认 0 即不淡出
    pub blend_band: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            distance_based: true,
            view_based: false,
            distance: 5.0,
            blend_band: 0.0,
        }
    }
}

impl LodSettings {
    /// 是否应当模拟
    ///
    /// 启用 LOD 但没有观察者时视为不可见。
    pub fn check_active(&self, anchor: Vec3, viewer: Option<&Viewer>) -> bool {
        if !self.enabled {
            return true;
        }
        let Some(viewer) = viewer else {
            return false;
        };
        if self.view_based && !viewer.sees(anchor) {
            return false;
        }
        !self.distance_based || viewer.position.distance(anchor) < self.distance
    }

    /// 动态混合的距离淡出系数 [0, 1]
    pub fn fade(&self, anchor: Vec3, viewer: Option<&Viewer>) -> f32 {
        if !self.enabled || !self.distance_based || self.blend_band <= 0.0 {
            return 1.0;
        }
        let Some(viewer) = viewer else {
            return 1.0;
        };
        let d = viewer.position.distance(anchor);
        (1.0 - (d - self.distance + self.blend_band) / self.blend_band).clamp(0.0, 1.0)
    }
}
