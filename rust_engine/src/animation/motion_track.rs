//! 动作轨道
//!
//! 每条轨道保存同一目标按帧序号排序的关键帧，以及上次求值时的区间游标。
//! 顺序播放时从游标处向后查找，时间倒退时从头查找。

use glam::{Quat, Vec3};

use super::keyframe::{
    BoneKeyframe, CameraKeyframe, KeyframeName, LightKeyframe, MorphKeyframe, Timed,
};

/// 循环衔接状态（由 [`super::Motion`] 持有并在求值时传入）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopContext {
    /// 是否以快照平滑衔接循环起点
    pub override_first: bool,
    /// 最近一次循环起点的帧序号
    pub last_loop_start: f32,
    /// 当前平滑窗口（帧）
    pub smear: f32,
}

impl LoopContext {
    pub const DISABLED: Self = Self {
        override_first: false,
        last_loop_start: 0.0,
        smear: 0.0,
    };
}

/// 动作轨道
pub trait MotionTrack {
    type Value;

    /// 在指定帧求值，空轨道返回 `None`
    fn evaluate(&mut self, frame_at: f32, loop_context: &LoopContext) -> Option<Self::Value>;

    /// 游标回到起点
    fn reset_cursor(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn max_frame_index(&self) -> f32;
}

/// 查找包含 `frame_at` 的关键帧区间 `(k1, k2)`
///
/// `k2` 是第一个帧序号不小于 `frame_at` 的关键帧，`k1 = k2 - 1`（不小于 0）。
pub(crate) fn search_bracket<K: Timed>(keyframes: &[K], cursor: usize, frame_at: f32) -> (usize, usize) {
    let n = keyframes.len();
    debug_assert!(n > 0);
    let cursor = cursor.min(n - 1);
    let range = if frame_at >= keyframes[cursor].frame_index() {
        cursor..n
    } else {
        0..cursor + 1
    };
    let k2 = range
        .into_iter()
        .find(|&i| frame_at <= keyframes[i].frame_index())
        .unwrap_or(n)
        .min(n - 1);
    (k2.saturating_sub(1), k2)
}

/// 帧序号不超过最后一个关键帧
fn clamp_frame<K: Timed>(keyframes: &[K], frame_at: f32) -> f32 {
    match keyframes.last() {
        Some(last) if frame_at > last.frame_index() => last.frame_index(),
        _ => frame_at,
    }
}

fn max_frame_of<K: Timed>(keyframes: &[K]) -> f32 {
    keyframes.last().map(Timed::frame_index).unwrap_or(0.0)
}

/// 插值区间
#[derive(Clone, Copy, Debug)]
struct Segment<T> {
    from: T,
    to: T,
    time_from: f32,
    time_to: f32,
    /// 提供插值曲线的关键帧
    curve: usize,
}

impl<T: Copy> Segment<T> {
    /// 按 `frame_at` 相对区间的位置取值，区间内部用 `blend` 插值
    fn resolve(&self, frame_at: f32, blend: impl FnOnce(f32) -> T) -> T {
        if self.time_from == self.time_to {
            return self.from;
        }
        if frame_at <= self.time_from {
            self.from
        } else if frame_at >= self.time_to {
            self.to
        } else {
            blend((frame_at - self.time_from) / (self.time_to - self.time_from))
        }
    }
}

/// 循环起点附近的范围（帧）：下一个关键帧落在其中时直接从快照过渡过去
///
/// 与平滑窗口无关，窗口缩到 0 后快照仍然生效。
pub const LOOP_START_MARGIN: f32 = 60.0;

/// 确定插值区间，处理循环起点附近的快照衔接
///
/// 区间起点总是严格早于终点，因此关键帧所在帧的取值不变。
fn plan_segment<K: Timed, T: Copy>(
    keyframes: &[K],
    (k1, k2): (usize, usize),
    frame_at: f32,
    value: impl Fn(&K) -> T,
    snapshot: T,
    loop_context: &LoopContext,
) -> Segment<T> {
    let n = keyframes.len();
    let mut segment = Segment {
        from: value(&keyframes[k1]),
        to: value(&keyframes[k2]),
        time_from: keyframes[k1].frame_index(),
        time_to: keyframes[k2].frame_index(),
        curve: k2,
    };
    let start = loop_context.last_loop_start;
    let smear = loop_context.smear;
    if loop_context.override_first && (k1 == 0 || segment.time_from <= start) {
        let near_start = segment.time_to > start
            && (segment.time_to < start + LOOP_START_MARGIN || segment.time_to <= start + smear);
        if n > 1 && near_start {
            // 下一个关键帧在循环起点附近或窗口之内：直接从快照过渡过去
            segment.from = snapshot;
            segment.time_from = start;
        } else if frame_at - start < smear {
            // 平滑窗口内：从快照过渡到区间起点的关键帧
            segment.from = snapshot;
            segment.to = value(&keyframes[k1]);
            segment.time_from = start;
            segment.time_to = start + smear;
            segment.curve = k1;
        } else if n > 1 && start + smear < segment.time_to {
            // 窗口之后：区间起点推迟到窗口结束
            segment.time_from = start + smear;
        }
    }
    segment
}

/// 骨骼轨道求值结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneFrameTransform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for BoneFrameTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl BoneFrameTransform {
    /// 与当前值按 `blend_rate` 混合
    pub fn blended_with(&self, current: &BoneFrameTransform, blend_rate: f32) -> BoneFrameTransform {
        if blend_rate >= 1.0 {
            return *self;
        }
        BoneFrameTransform {
            translation: current.translation.lerp(self.translation, blend_rate),
            rotation: current.rotation.slerp(self.rotation, blend_rate),
        }
    }
}

/// 骨骼轨道
#[derive(Clone, Debug)]
pub struct BoneMotionTrack {
    pub name: KeyframeName,
    keyframes: Vec<BoneKeyframe>,
    cursor: usize,
    /// 绑定后的骨骼索引
    pub(crate) bone_index: Option<usize>,
    /// 循环起点处的骨骼状态
    pub(crate) snapshot: BoneFrameTransform,
}

impl BoneMotionTrack {
    /// 关键帧按帧序号稳定排序
    pub fn new(name: KeyframeName, mut keyframes: Vec<BoneKeyframe>) -> Self {
        keyframes.sort_by(|a, b| a.frame_index.total_cmp(&b.frame_index));
        Self {
            name,
            keyframes,
            cursor: 0,
            bone_index: None,
            snapshot: BoneFrameTransform::default(),
        }
    }

    pub fn keyframes(&self) -> &[BoneKeyframe] {
        &self.keyframes
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn bone_index(&self) -> Option<usize> {
        self.bone_index
    }
}

impl MotionTrack for BoneMotionTrack {
    type Value = BoneFrameTransform;

    fn evaluate(&mut self, frame_at: f32, loop_context: &LoopContext) -> Option<Self::Value> {
        if self.keyframes.is_empty() {
            return None;
        }
        let frame_at = clamp_frame(&self.keyframes, frame_at);
        let bracket = search_bracket(&self.keyframes, self.cursor, frame_at);
        self.cursor = bracket.0;

        let segment = plan_segment(
            &self.keyframes,
            bracket,
            frame_at,
            |k| BoneFrameTransform {
                translation: k.translation,
                rotation: k.rotation,
            },
            self.snapshot,
            loop_context,
        );
        let curves = &self.keyframes[segment.curve];
        Some(segment.resolve(frame_at, |w| {
            let (from, to) = (segment.from, segment.to);
            BoneFrameTransform {
                translation: Vec3::new(
                    lerp(from.translation.x, to.translation.x, curves.interp_x.weight(w)),
                    lerp(from.translation.y, to.translation.y, curves.interp_y.weight(w)),
                    lerp(from.translation.z, to.translation.z, curves.interp_z.weight(w)),
                ),
                rotation: from.rotation.slerp(to.rotation, curves.interp_rotation.weight(w)),
            }
        }))
    }

    fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.keyframes.len()
    }

    fn max_frame_index(&self) -> f32 {
        max_frame_of(&self.keyframes)
    }
}

/// Morph 轨道（线性插值）
#[derive(Clone, Debug)]
pub struct MorphMotionTrack {
    pub name: KeyframeName,
    keyframes: Vec<MorphKeyframe>,
    cursor: usize,
    pub(crate) morph_index: Option<usize>,
    pub(crate) snapshot: f32,
}

impl MorphMotionTrack {
    pub fn new(name: KeyframeName, mut keyframes: Vec<MorphKeyframe>) -> Self {
        keyframes.sort_by(|a, b| a.frame_index.total_cmp(&b.frame_index));
        Self {
            name,
            keyframes,
            cursor: 0,
            morph_index: None,
            snapshot: 0.0,
        }
    }

    pub fn keyframes(&self) -> &[MorphKeyframe] {
        &self.keyframes
    }

    pub fn morph_index(&self) -> Option<usize> {
        self.morph_index
    }
}

impl MotionTrack for MorphMotionTrack {
    type Value = f32;

    fn evaluate(&mut self, frame_at: f32, loop_context: &LoopContext) -> Option<f32> {
        if self.keyframes.is_empty() {
            return None;
        }
        let frame_at = clamp_frame(&self.keyframes, frame_at);
        let bracket = search_bracket(&self.keyframes, self.cursor, frame_at);
        self.cursor = bracket.0;

        let segment = plan_segment(
            &self.keyframes,
            bracket,
            frame_at,
            |k| k.weight,
            self.snapshot,
            loop_context,
        );
        Some(segment.resolve(frame_at, |w| lerp(segment.from, segment.to, w)))
    }

    fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.keyframes.len()
    }

    fn max_frame_index(&self) -> f32 {
        max_frame_of(&self.keyframes)
    }
}

/// 相机求值结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub angle: Vec3,
    pub distance: f32,
    pub fov: f32,
    pub perspective: bool,
}

/// 相机轨道
#[derive(Clone, Debug, Default)]
pub struct CameraMotionTrack {
    keyframes: Vec<CameraKeyframe>,
    cursor: usize,
}

impl CameraMotionTrack {
    pub fn new(mut keyframes: Vec<CameraKeyframe>) -> Self {
        keyframes.sort_by(|a, b| a.frame_index.total_cmp(&b.frame_index));
        Self {
            keyframes,
            cursor: 0,
        }
    }

    pub fn keyframes(&self) -> &[CameraKeyframe] {
        &self.keyframes
    }
}

fn camera_state(k: &CameraKeyframe) -> CameraState {
    CameraState {
        position: k.position,
        angle: k.angle,
        distance: k.distance,
        fov: k.fov as f32,
        perspective: k.is_perspective(),
    }
}

impl MotionTrack for CameraMotionTrack {
    type Value = CameraState;

    fn evaluate(&mut self, frame_at: f32, _loop_context: &LoopContext) -> Option<CameraState> {
        if self.keyframes.is_empty() {
            return None;
        }
        let frame_at = clamp_frame(&self.keyframes, frame_at);
        let bracket = search_bracket(&self.keyframes, self.cursor, frame_at);
        self.cursor = bracket.0;

        let segment = plan_segment(
            &self.keyframes,
            bracket,
            frame_at,
            camera_state,
            CameraState {
                position: Vec3::ZERO,
                angle: Vec3::ZERO,
                distance: 0.0,
                fov: 0.0,
                perspective: true,
            },
            &LoopContext::DISABLED,
        );
        let curves = &self.keyframes[segment.curve];
        Some(segment.resolve(frame_at, |w| {
            let (from, to) = (segment.from, segment.to);
            CameraState {
                position: Vec3::new(
                    lerp(from.position.x, to.position.x, curves.interp_x.weight(w)),
                    lerp(from.position.y, to.position.y, curves.interp_y.weight(w)),
                    lerp(from.position.z, to.position.z, curves.interp_z.weight(w)),
                ),
                angle: from.angle.lerp(to.angle, curves.interp_rotation.weight(w)),
                distance: lerp(from.distance, to.distance, curves.interp_distance.weight(w)),
                fov: lerp(from.fov, to.fov, curves.interp_fov.weight(w)),
                perspective: from.perspective,
            }
        }))
    }

    fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.keyframes.len()
    }

    fn max_frame_index(&self) -> f32 {
        max_frame_of(&self.keyframes)
    }
}

/// 照明求值结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightState {
    pub color: Vec3,
    pub direction: Vec3,
}

/// 照明轨道（线性插值）
#[derive(Clone, Debug, Default)]
pub struct LightMotionTrack {
    keyframes: Vec<LightKeyframe>,
    cursor: usize,
}

impl LightMotionTrack {
    pub fn new(mut keyframes: Vec<LightKeyframe>) -> Self {
        keyframes.sort_by(|a, b| a.frame_index.total_cmp(&b.frame_index));
        Self {
            keyframes,
            cursor: 0,
        }
    }

    pub fn keyframes(&self) -> &[LightKeyframe] {
        &self.keyframes
    }
}

impl MotionTrack for LightMotionTrack {
    type Value = LightState;

    fn evaluate(&mut self, frame_at: f32, _loop_context: &LoopContext) -> Option<LightState> {
        if self.keyframes.is_empty() {
            return None;
        }
        let frame_at = clamp_frame(&self.keyframes, frame_at);
        let bracket = search_bracket(&self.keyframes, self.cursor, frame_at);
        self.cursor = bracket.0;

        let value = |k: &LightKeyframe| LightState {
            color: k.color,
            direction: k.direction,
        };
        let segment = plan_segment(
            &self.keyframes,
            bracket,
            frame_at,
            value,
            value(&self.keyframes[0]),
            &LoopContext::DISABLED,
        );
        Some(segment.resolve(frame_at, |w| LightState {
            color: segment.from.color.lerp(segment.to.color, w),
            direction: segment.from.direction.lerp(segment.to.direction, w),
        }))
    }

    fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.keyframes.len()
    }

    fn max_frame_index(&self) -> f32 {
        max_frame_of(&self.keyframes)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
