//! VMD 动作加载器
//!
//! 与 PMD 相同的两阶段：[`MotionLayout::validate`] 检查边界，
//! [`build_motion`] 在校验后的布局上构建轨道。

use std::path::Path;

use crate::config::EngineConfig;
use crate::{MmdError, Result};

use super::keyframe::{
    BoneKeyframe, CameraKeyframe, Keyframe, LightKeyframe, MorphKeyframe, SelfShadowKeyframe,
};
use super::layout::{
    MotionError, MotionLayout, BONE_KEYFRAME_STRIDE, CAMERA_KEYFRAME_STRIDE,
    LIGHT_KEYFRAME_STRIDE, MORPH_KEYFRAME_STRIDE, SELF_SHADOW_KEYFRAME_STRIDE,
};
use super::motion::{Motion, MotionName};
use super::motion_track::MotionTrack;

/// 先校验再构建；校验失败时 `build` 不会被调用
pub fn load_with<'a, T>(
    bytes: &'a [u8],
    build: impl FnOnce(&MotionLayout<'a>) -> T,
) -> std::result::Result<T, MotionError> {
    let layout = MotionLayout::validate(bytes)?;
    Ok(build(&layout))
}

/// 从内存加载 VMD 动作
pub fn load_vmd(bytes: &[u8], config: &EngineConfig) -> std::result::Result<Motion, MotionError> {
    load_with(bytes, |layout| build_motion(layout, config))
}

/// 从文件加载 VMD 动作
pub fn load_vmd_file<P: AsRef<Path>>(path: P, config: &EngineConfig) -> Result<Motion> {
    let bytes = std::fs::read(path.as_ref()).map_err(MmdError::Io)?;
    Ok(load_vmd(&bytes, config)?)
}

/// 在校验后的布局上构建动作
pub fn build_motion(layout: &MotionLayout<'_>, config: &EngineConfig) -> Motion {
    let handedness = config.handedness();

    let bones = layout
        .bone_keyframes
        .records(BONE_KEYFRAME_STRIDE)
        .map(|record| Keyframe::Bone(BoneKeyframe::read(record, handedness)));
    let morphs = layout
        .morph_keyframes
        .records(MORPH_KEYFRAME_STRIDE)
        .map(|record| Keyframe::Morph(MorphKeyframe::read(record)));
    let cameras = layout
        .camera_keyframes
        .records(CAMERA_KEYFRAME_STRIDE)
        .map(|record| Keyframe::Camera(CameraKeyframe::read(record, handedness)));
    let lights = layout
        .light_keyframes
        .records(LIGHT_KEYFRAME_STRIDE)
        .map(|record| Keyframe::Light(LightKeyframe::read(record, handedness)));
    let self_shadows = layout
        .self_shadow_keyframes
        .records(SELF_SHADOW_KEYFRAME_STRIDE)
        .map(|record| Keyframe::SelfShadow(SelfShadowKeyframe::read(record)));

    let keyframes = bones.chain(morphs).chain(cameras).chain(lights).chain(self_shadows);
    let motion = Motion::from_keyframes(MotionName::from_bytes(layout.name), keyframes, config);

    log::info!(
        "VMD motion {} built: {} bone keyframes in {} tracks, {} morph keyframes in {} tracks, {} camera, {} light, {} self shadow keyframes, max frame {}",
        motion.name,
        layout.bone_keyframes.count,
        motion.bone_tracks().len(),
        layout.morph_keyframes.count,
        motion.morph_tracks().len(),
        motion.camera_track().len(),
        motion.light_track().len(),
        motion.self_shadow_keyframes().len(),
        motion.max_frame(),
    );

    motion
}
