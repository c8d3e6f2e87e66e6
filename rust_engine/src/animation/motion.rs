//! VMD 动作控制器
//!
//! 状态：未绑定 -> 播放中 -> 已结束。轨道按名称绑定到模型的骨骼和表情，
//! 不持有模型引用，每次求值时由调用方传入骨骼/表情管理器。

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use glam::Vec3;

use crate::binary::FixedString;
use crate::config::{EngineConfig, Handedness};
use crate::morph::MorphManager;
use crate::skeleton::BoneManager;

use super::keyframe::{Keyframe, SelfShadowKeyframe};
use super::layout::{HEADER_SIZE, SIGNATURE_SIZE, VMD_SIGNATURE};
use super::motion_track::{
    BoneFrameTransform, BoneMotionTrack, CameraMotionTrack, CameraState, LightMotionTrack,
    LightState, LoopContext, MorphMotionTrack, MotionTrack,
};

/// 动作名称（20 字节）
pub type MotionName = FixedString<20>;

/// 动作状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionStatus {
    /// 尚未绑定到模型
    Unattached,
    Active,
    /// 播放到结尾且未开启循环
    Inactive,
}

/// VMD 动作
#[derive(Clone, Debug)]
pub struct Motion {
    pub name: MotionName,
    bone_tracks: Vec<BoneMotionTrack>,
    morph_tracks: Vec<MorphMotionTrack>,
    camera_track: CameraMotionTrack,
    light_track: LightMotionTrack,
    self_shadow_keyframes: Vec<SelfShadowKeyframe>,
    handedness: Handedness,

    status: MotionStatus,
    current_frame: f32,
    previous_frame: f32,
    max_frame: f32,
    blend_rate: f32,

    looping: bool,
    loop_target: f32,
    override_first: bool,
    center: Vec3,
    last_loop_start: f32,
    smear_default: f32,
    smear: f32,

    camera_state: Option<CameraState>,
    light_state: Option<LightState>,
}

impl Motion {
    /// 从关键帧构建，骨骼/表情关键帧按名称分组为轨道（保持首次出现的顺序）
    pub fn from_keyframes(
        name: MotionName,
        keyframes: impl IntoIterator<Item = Keyframe>,
        config: &EngineConfig,
    ) -> Self {
        let mut bone_groups: Vec<(FixedString<15>, Vec<_>)> = Vec::new();
        let mut bone_lookup: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut morph_groups: Vec<(FixedString<15>, Vec<_>)> = Vec::new();
        let mut morph_lookup: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut cameras = Vec::new();
        let mut lights = Vec::new();
        let mut self_shadows = Vec::new();

        for keyframe in keyframes {
            match keyframe {
                Keyframe::Bone(k) => {
                    let index = *bone_lookup.entry(k.name.as_bytes().to_vec()).or_insert_with(|| {
                        bone_groups.push((k.name, Vec::new()));
                        bone_groups.len() - 1
                    });
                    bone_groups[index].1.push(k);
                }
                Keyframe::Morph(k) => {
                    let index = *morph_lookup.entry(k.name.as_bytes().to_vec()).or_insert_with(|| {
                        morph_groups.push((k.name, Vec::new()));
                        morph_groups.len() - 1
                    });
                    morph_groups[index].1.push(k);
                }
                Keyframe::Camera(k) => cameras.push(k),
                Keyframe::Light(k) => lights.push(k),
                Keyframe::SelfShadow(k) => self_shadows.push(k),
            }
        }
        self_shadows.sort_by(|a: &SelfShadowKeyframe, b| a.frame_index.total_cmp(&b.frame_index));

        let mut motion = Self {
            name,
            bone_tracks: bone_groups
                .into_iter()
                .map(|(name, keys)| BoneMotionTrack::new(name, keys))
                .collect(),
            morph_tracks: morph_groups
                .into_iter()
                .map(|(name, keys)| MorphMotionTrack::new(name, keys))
                .collect(),
            camera_track: CameraMotionTrack::new(cameras),
            light_track: LightMotionTrack::new(lights),
            self_shadow_keyframes: self_shadows,
            handedness: config.handedness(),
            status: MotionStatus::Unattached,
            current_frame: 0.0,
            previous_frame: 0.0,
            max_frame: 0.0,
            blend_rate: 1.0,
            looping: false,
            loop_target: 0.0,
            override_first: false,
            center: Vec3::ZERO,
            last_loop_start: 0.0,
            smear_default: config.smear_frames,
            smear: config.smear_frames,
            camera_state: None,
            light_state: None,
        };
        motion.max_frame = motion.compute_max_frame();
        motion
    }

    fn compute_max_frame(&self) -> f32 {
        let bones = self.bone_tracks.iter().map(MotionTrack::max_frame_index);
        let morphs = self.morph_tracks.iter().map(MotionTrack::max_frame_index);
        bones
            .chain(morphs)
            .chain([
                self.camera_track.max_frame_index(),
                self.light_track.max_frame_index(),
            ])
            .fold(0.0, f32::max)
    }

    /// 绑定到模型：按名称查找骨骼和表情，找不到目标的轨道直接丢弃
    pub fn attach(&mut self, bones: &BoneManager, morphs: &MorphManager) {
        if self.status != MotionStatus::Unattached {
            log::debug!("Motion {} is already attached", self.name);
            return;
        }

        self.bone_tracks.retain_mut(|track| {
            track.bone_index = bones.find_bone_by_name(track.name.as_bytes());
            if track.bone_index.is_none() {
                log::debug!("Dropping bone track {}: no matching bone", track.name);
            }
            track.bone_index.is_some()
        });
        self.morph_tracks.retain_mut(|track| {
            track.morph_index = morphs.find_morph_by_name(track.name.as_bytes());
            if track.morph_index.is_none() {
                log::debug!("Dropping morph track {}: no matching morph", track.name);
            }
            track.morph_index.is_some()
        });

        self.max_frame = self.compute_max_frame();
        self.status = MotionStatus::Active;
    }

    fn loop_context(&self) -> LoopContext {
        LoopContext {
            override_first: self.override_first,
            last_loop_start: self.last_loop_start,
            smear: self.smear,
        }
    }

    /// 在指定帧求值所有轨道并写入绑定的骨骼和表情
    fn evaluate(&mut self, frame: f32, bones: &mut BoneManager, morphs: &mut MorphManager) {
        let loop_context = self.loop_context();
        let blend_rate = self.blend_rate;

        for track in &mut self.bone_tracks {
            let Some(index) = track.bone_index else {
                continue;
            };
            let Some(value) = track.evaluate(frame, &loop_context) else {
                continue;
            };
            let Some(bone) = bones.get_bone(index) else {
                continue;
            };
            let current = BoneFrameTransform {
                translation: bone.animation_translate,
                rotation: bone.animation_rotate,
            };
            let value = value.blended_with(&current, blend_rate);
            bones.set_bone_translation(index, value.translation);
            bones.set_bone_rotation(index, value.rotation);
        }

        for track in &mut self.morph_tracks {
            let Some(index) = track.morph_index else {
                continue;
            };
            let Some(weight) = track.evaluate(frame, &loop_context) else {
                continue;
            };
            let Some(morph) = morphs.get_morph(index) else {
                continue;
            };
            let weight = if blend_rate >= 1.0 {
                weight
            } else {
                morph.get_weight() * (1.0 - blend_rate) + weight * blend_rate
            };
            morphs.set_morph_weight(index, weight);
        }

        self.camera_state = self.camera_track.evaluate(frame, &loop_context);
        self.light_state = self.light_track.evaluate(frame, &loop_context);
    }

    /// 跳转到指定帧（不做时间积分，用于拖动进度）
    pub fn seek(&mut self, frame: f32, bones: &mut BoneManager, morphs: &mut MorphManager) {
        self.evaluate(frame, bones, morphs);
        self.previous_frame = self.current_frame;
        self.current_frame = frame;
    }

    /// 推进 `delta_frame` 帧
    ///
    /// 到达最大帧时：开启循环则回绕到循环目标帧，否则停止播放。
    pub fn advance(&mut self, delta_frame: f32, bones: &mut BoneManager, morphs: &mut MorphManager) {
        if self.status != MotionStatus::Active {
            return;
        }
        self.previous_frame = self.current_frame;
        self.current_frame += delta_frame;
        self.evaluate(self.current_frame, bones, morphs);

        if self.current_frame >= self.max_frame {
            if self.looping {
                self.rewind(self.loop_target, delta_frame, bones, morphs);
            } else {
                self.status = MotionStatus::Inactive;
            }
        }
    }

    /// 回绕到 `target` 帧，超出结尾的部分保留到新的当前帧中
    ///
    /// 开启平滑衔接时，每次回绕都以 `center` 为参考重新拍摄快照，
    /// 平滑窗口每次缩短一帧直到 0；循环起点附近的关键帧仍从快照过渡。
    pub fn rewind(&mut self, target: f32, delta_frame: f32, bones: &BoneManager, morphs: &MorphManager) {
        self.current_frame = self.previous_frame + delta_frame - self.max_frame + target;
        self.previous_frame = target;
        if self.override_first {
            self.take_snapshot(bones, morphs);
            self.last_loop_start = target;
            // 每次回绕固定缩短一帧，`override_first` 恢复默认
            self.smear = (self.smear - 1.0).max(0.0);
        }
    }

    /// 从当前姿态平滑过渡到动作开头
    ///
    /// `center` 是与动作无关骨骼快照的参考位置。
    pub fn override_first(&mut self, center: Vec3, bones: &BoneManager, morphs: &MorphManager) {
        self.override_first = true;
        self.center = center;
        self.take_snapshot(bones, morphs);
        self.last_loop_start = self.current_frame;
        self.smear = self.smear_default;
    }

    fn take_snapshot(&mut self, bones: &BoneManager, morphs: &MorphManager) {
        for track in &mut self.bone_tracks {
            let Some(bone) = track.bone_index.and_then(|index| bones.get_bone(index)) else {
                continue;
            };
            let mut translation = bone.animation_translate;
            if bone.motion_independent {
                translation -= self.center;
            }
            track.snapshot = BoneFrameTransform {
                translation,
                rotation: bone.animation_rotate,
            };
        }
        for track in &mut self.morph_tracks {
            if let Some(morph) = track.morph_index.and_then(|index| morphs.get_morph(index)) {
                track.snapshot = morph.get_weight();
            }
        }
    }

    /// 回到开头：帧序号、混合率、游标和平滑窗口恢复默认
    pub fn reset(&mut self) {
        self.current_frame = 0.0;
        self.previous_frame = 0.0;
        self.blend_rate = 1.0;
        self.last_loop_start = 0.0;
        self.smear = self.smear_default;
        for track in &mut self.bone_tracks {
            track.reset_cursor();
        }
        for track in &mut self.morph_tracks {
            track.reset_cursor();
        }
        self.camera_track.reset_cursor();
        self.light_track.reset_cursor();
        if self.status == MotionStatus::Inactive {
            self.status = MotionStatus::Active;
        }
    }

    /// 设置混合率（钳制到 [0, 1]）
    pub fn set_blend_rate(&mut self, blend_rate: f32) {
        self.blend_rate = blend_rate.clamp(0.0, 1.0);
    }

    pub fn blend_rate(&self) -> f32 {
        self.blend_rate
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// 循环时回绕到的帧
    pub fn set_loop_target(&mut self, target: f32) {
        self.loop_target = target;
    }

    pub fn status(&self) -> MotionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == MotionStatus::Active
    }

    pub fn current_frame(&self) -> f32 {
        self.current_frame
    }

    pub fn previous_frame(&self) -> f32 {
        self.previous_frame
    }

    pub fn max_frame(&self) -> f32 {
        self.max_frame
    }

    /// 当前平滑窗口（帧）
    pub fn smear(&self) -> f32 {
        self.smear
    }

    pub fn last_loop_start(&self) -> f32 {
        self.last_loop_start
    }

    pub fn bone_tracks(&self) -> &[BoneMotionTrack] {
        &self.bone_tracks
    }

    pub fn morph_tracks(&self) -> &[MorphMotionTrack] {
        &self.morph_tracks
    }

    pub fn camera_track(&self) -> &CameraMotionTrack {
        &self.camera_track
    }

    pub fn light_track(&self) -> &LightMotionTrack {
        &self.light_track
    }

    pub fn self_shadow_keyframes(&self) -> &[SelfShadowKeyframe] {
        &self.self_shadow_keyframes
    }

    /// 最近一次求值的相机状态（无相机关键帧时为 `None`）
    pub fn camera_state(&self) -> Option<&CameraState> {
        self.camera_state.as_ref()
    }

    pub fn light_state(&self) -> Option<&LightState> {
        self.light_state.as_ref()
    }

    /// 指定帧生效的本影设置
    pub fn self_shadow_at(&self, frame: f32) -> Option<&SelfShadowKeyframe> {
        self.self_shadow_keyframes
            .iter()
            .take_while(|k| k.frame_index <= frame)
            .last()
    }

    /// 重新生成完整的 VMD 缓冲区（五个区域全部写出）
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature[..VMD_SIGNATURE.len()].copy_from_slice(VMD_SIGNATURE);
        buf.extend_from_slice(&signature);
        buf.extend_from_slice(self.name.raw());

        let bone_count = self.bone_tracks.iter().map(|t| t.keyframes().len()).sum();
        push_count(&mut buf, bone_count);
        for track in &self.bone_tracks {
            for keyframe in track.keyframes() {
                buf.extend_from_slice(&keyframe.to_bytes(self.handedness));
            }
        }

        let morph_count = self.morph_tracks.iter().map(|t| t.keyframes().len()).sum();
        push_count(&mut buf, morph_count);
        for track in &self.morph_tracks {
            for keyframe in track.keyframes() {
                buf.extend_from_slice(&keyframe.to_bytes());
            }
        }

        push_count(&mut buf, self.camera_track.len());
        for keyframe in self.camera_track.keyframes() {
            buf.extend_from_slice(&keyframe.to_bytes(self.handedness));
        }
        push_count(&mut buf, self.light_track.len());
        for keyframe in self.light_track.keyframes() {
            buf.extend_from_slice(&keyframe.to_bytes(self.handedness));
        }
        push_count(&mut buf, self.self_shadow_keyframes.len());
        for keyframe in &self.self_shadow_keyframes {
            buf.extend_from_slice(&keyframe.to_bytes());
        }
        buf
    }
}

fn push_count(buf: &mut Vec<u8>, count: usize) {
    let mut bytes = [0u8; 4];
    LittleEndian::write_u32(&mut bytes, count as u32);
    buf.extend_from_slice(&bytes);
}
