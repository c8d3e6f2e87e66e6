//! VMD 缓冲区布局校验

use thiserror::Error;

use crate::binary::{ByteReader, Region};

pub const VMD_SIGNATURE: &[u8; 25] = b"Vocaloid Motion Data 0002";
pub const SIGNATURE_SIZE: usize = 30;
pub const MOTION_NAME_SIZE: usize = 20;
pub const HEADER_SIZE: usize = SIGNATURE_SIZE + MOTION_NAME_SIZE;

pub const BONE_KEYFRAME_STRIDE: usize = 111;
pub const MORPH_KEYFRAME_STRIDE: usize = 23;
pub const CAMERA_KEYFRAME_STRIDE: usize = 61;
pub const LIGHT_KEYFRAME_STRIDE: usize = 28;
pub const SELF_SHADOW_KEYFRAME_STRIDE: usize = 9;

/// VMD 解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MotionError {
    #[error("buffer is shorter than the VMD header")]
    InvalidHeader,
    #[error("VMD signature mismatch")]
    InvalidSignature,

    #[error("bone keyframe count is missing")]
    BoneKeyframesSize,
    #[error("bone keyframes overrun the buffer")]
    BoneKeyframesData,
    #[error("morph keyframe count is missing")]
    MorphKeyframesSize,
    #[error("morph keyframes overrun the buffer")]
    MorphKeyframesData,
    #[error("camera keyframe count is missing")]
    CameraKeyframesSize,
    #[error("camera keyframes overrun the buffer")]
    CameraKeyframesData,
    #[error("light keyframe count is missing")]
    LightKeyframesSize,
    #[error("light keyframes overrun the buffer")]
    LightKeyframesData,
    #[error("self shadow keyframe count is missing")]
    SelfShadowKeyframesSize,
    #[error("self shadow keyframes overrun the buffer")]
    SelfShadowKeyframesData,
}

/// 校验后的 VMD 布局
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionLayout<'a> {
    pub name: &'a [u8],
    pub bone_keyframes: Region<'a>,
    pub morph_keyframes: Region<'a>,
    pub camera_keyframes: Region<'a>,
    pub light_keyframes: Region<'a>,
    pub self_shadow_keyframes: Region<'a>,
}

impl<'a> MotionLayout<'a> {
    /// 校验缓冲区，返回遇到的第一个错误
    pub fn validate(bytes: &'a [u8]) -> Result<Self, MotionError> {
        let mut reader = ByteReader::new(bytes);
        let header = reader.take(HEADER_SIZE).ok_or(MotionError::InvalidHeader)?;
        if !header.starts_with(VMD_SIGNATURE) {
            return Err(MotionError::InvalidSignature);
        }

        let mut layout = MotionLayout {
            name: &header[SIGNATURE_SIZE..],
            ..Default::default()
        };
        layout.bone_keyframes = region(
            &mut reader,
            BONE_KEYFRAME_STRIDE,
            MotionError::BoneKeyframesSize,
            MotionError::BoneKeyframesData,
        )?;
        layout.morph_keyframes = region(
            &mut reader,
            MORPH_KEYFRAME_STRIDE,
            MotionError::MorphKeyframesSize,
            MotionError::MorphKeyframesData,
        )?;

        // 旧版本导出的文件在表情之后就结束了
        if reader.is_empty() {
            return Ok(layout);
        }
        layout.camera_keyframes = region(
            &mut reader,
            CAMERA_KEYFRAME_STRIDE,
            MotionError::CameraKeyframesSize,
            MotionError::CameraKeyframesData,
        )?;
        if reader.is_empty() {
            return Ok(layout);
        }
        layout.light_keyframes = region(
            &mut reader,
            LIGHT_KEYFRAME_STRIDE,
            MotionError::LightKeyframesSize,
            MotionError::LightKeyframesData,
        )?;
        if reader.is_empty() {
            return Ok(layout);
        }
        layout.self_shadow_keyframes = region(
            &mut reader,
            SELF_SHADOW_KEYFRAME_STRIDE,
            MotionError::SelfShadowKeyframesSize,
            MotionError::SelfShadowKeyframesData,
        )?;

        Ok(layout)
    }
}

/// u32 数量字段 + 定长记录
fn region<'a>(
    reader: &mut ByteReader<'a>,
    stride: usize,
    size_error: MotionError,
    data_error: MotionError,
) -> Result<Region<'a>, MotionError> {
    let count = reader.read_u32().ok_or(size_error)? as usize;
    let bytes = reader.take_records(count, stride).ok_or(data_error)?;
    Ok(Region::new(bytes, count))
}
