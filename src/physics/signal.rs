//! 位置信号
//!
//! 保存前后两个 (位置, 时间) 采样，按时间线性插值或外推。
//! 速度由两次采样之差隐式给出，Verlet 积分直接读取。

use glam::Vec3;

/// 以采样区间为单位的最大外推 (current 之后一个区间)
const MAX_EXTRAPOLATION: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Frame {
    position: Vec3,
    time: f64,
}

/// 两采样位置历史
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionSignal {
    previous: Frame,
    current: Frame,
}

impl PositionSignal {
    /// 以单一采样初始化（前后帧相同，速度为零）
    pub fn new(position: Vec3, time: f64) -> Self {
        let frame = Frame { position, time };
        Self { previous: frame, current: frame }
    }

    /// 写入新采样：current → previous
    #[inline]
    pub fn set_position(&mut self, position: Vec3, time: f64) {
        self.previous = self.current;
        self.current = Frame { position, time };
    }

    /// 在时间 t 采样
    ///
    /// t 超出采样窗口时线性外推，固定步之间的渲染帧依赖这一点。
    /// 外推最多一个采样区间，历史过旧时不会把速度放大。
    pub fn sample_position(&self, time: f64) -> Vec3 {
        let span = self.current.time - self.previous.time;
        if span <= 0.0 {
            return self.previous.position;
        }
        let t = ((time - self.previous.time) / span).min(MAX_EXTRAPOLATION);
        self.previous.position.lerp(self.current.position, t as f32)
    }

    /// 两个采样都设为 position，时间回拨
    ///
    /// current 落在 `time - window`，previous 落在 `time - 2 * window`。
    /// window 取最大追帧时长，同帧补跑的 tick 不会早于 current。
    pub fn flatten_signal(&mut self, time: f64, position: Vec3, window: f64) {
        self.previous = Frame { position, time: time - window * 2.0 };
        self.current = Frame { position, time: time - window };
    }

    /// 整体平移两个采样，时间不变，速度保持
    #[inline]
    pub fn offset_signal(&mut self, offset: Vec3) {
        self.previous.position += offset;
        self.current.position += offset;
    }

    /// 整体平移两个采样的时间，使 current 落在 time，区间与速度不变
    #[inline]
    pub fn retime_signal(&mut self, time: f64) {
        let shift = time - self.current.time;
        self.previous.time += shift;
        self.current.time += shift;
    }

    #[inline]
    pub fn current(&self) -> Vec3 {
        self.current.position
    }

    #[inline]
    pub fn previous(&self) -> Vec3 {
        self.previous.position
    }

    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current.time
    }

    #[inline]
    pub fn previous_time(&self) -> f64 {
        self.previous.time
    }

    /// 最近一个采样区间内的位移
    #[inline]
    pub fn delta(&self) -> Vec3 {
        self.current.position - self.previous.position
    }
}
