//! 动画关键帧
//!
//! 每种关键帧都保留名称和插值参数的原始字节，`to_bytes` 逐字节写回原记录。

use glam::{Quat, Vec3};

use crate::binary::{FieldReader, FieldWriter, FixedString};
use crate::config::Handedness;

use super::layout::{
    BONE_KEYFRAME_STRIDE, CAMERA_KEYFRAME_STRIDE, LIGHT_KEYFRAME_STRIDE, MORPH_KEYFRAME_STRIDE,
    SELF_SHADOW_KEYFRAME_STRIDE,
};
use super::InterpolationCurve;

/// 骨骼/表情名称（15 字节）
pub type KeyframeName = FixedString<15>;

/// 按帧序号排序的关键帧
pub trait Timed {
    fn frame_index(&self) -> f32;
}

/// 骨骼关键帧
#[derive(Clone, Debug)]
pub struct BoneKeyframe {
    pub name: KeyframeName,
    pub frame_index: f32,
    pub translation: Vec3,
    pub rotation: Quat,
    interpolation: [u8; 64],
    pub interp_x: InterpolationCurve,
    pub interp_y: InterpolationCurve,
    pub interp_z: InterpolationCurve,
    pub interp_rotation: InterpolationCurve,
}

impl BoneKeyframe {
    pub fn new(name: KeyframeName, frame_index: f32) -> Self {
        Self::with_interpolation(name, frame_index, Vec3::ZERO, Quat::IDENTITY, linear_bone_table())
    }

    /// 使用 VMD 格式的 64 字节插值表创建
    pub fn with_interpolation(
        name: KeyframeName,
        frame_index: f32,
        translation: Vec3,
        rotation: Quat,
        interpolation: [u8; 64],
    ) -> Self {
        // 第一行：X/Y/Z/R 各自的 x1，然后 y1、x2、y2
        let curve = |channel: usize| {
            InterpolationCurve::new(
                interpolation[channel],
                interpolation[4 + channel],
                interpolation[8 + channel],
                interpolation[12 + channel],
            )
        };
        Self {
            name,
            frame_index,
            translation,
            rotation,
            interpolation,
            interp_x: curve(0),
            interp_y: curve(1),
            interp_z: curve(2),
            interp_rotation: curve(3),
        }
    }

    pub fn read(record: &[u8], handedness: Handedness) -> Self {
        let mut reader = FieldReader::new(record);
        let name = KeyframeName::from_raw(reader.bytes());
        let frame_index = reader.u32() as f32;
        let translation = handedness.position(reader.vec3());
        let rotation = reader.vec4();
        let rotation = handedness.rotation(Quat::from_xyzw(rotation.x, rotation.y, rotation.z, rotation.w));
        Self::with_interpolation(name, frame_index, translation, rotation, reader.bytes())
    }

    pub fn to_bytes(&self, handedness: Handedness) -> [u8; BONE_KEYFRAME_STRIDE] {
        let mut writer = FieldWriter::new();
        writer.bytes(self.name.raw());
        writer.u32(self.frame_index as u32);
        writer.vec3(handedness.position(self.translation));
        let rotation = handedness.rotation(self.rotation);
        for v in [rotation.x, rotation.y, rotation.z, rotation.w] {
            writer.f32(v);
        }
        writer.bytes(&self.interpolation);
        writer.finish()
    }

    pub fn interpolation(&self) -> &[u8; 64] {
        &self.interpolation
    }
}

impl Timed for BoneKeyframe {
    fn frame_index(&self) -> f32 {
        self.frame_index
    }
}

/// 全部通道为直线的骨骼插值表
pub fn linear_bone_table() -> [u8; 64] {
    let mut table = [0u8; 64];
    for row in 0..4 {
        let base = row * 16;
        for i in 0..8 {
            table[base + i] = 20;
        }
        for i in 8..16 {
            table[base + i] = 107;
        }
    }
    table
}

/// Morph 关键帧
#[derive(Clone, Debug)]
pub struct MorphKeyframe {
    pub name: KeyframeName,
    pub frame_index: f32,
    pub weight: f32,
}

impl MorphKeyframe {
    pub fn new(name: KeyframeName, frame_index: f32, weight: f32) -> Self {
        Self {
            name,
            frame_index,
            weight,
        }
    }

    pub fn read(record: &[u8]) -> Self {
        let mut reader = FieldReader::new(record);
        Self {
            name: KeyframeName::from_raw(reader.bytes()),
            frame_index: reader.u32() as f32,
            weight: reader.f32(),
        }
    }

    pub fn to_bytes(&self) -> [u8; MORPH_KEYFRAME_STRIDE] {
        let mut writer = FieldWriter::new();
        writer.bytes(self.name.raw());
        writer.u32(self.frame_index as u32);
        writer.f32(self.weight);
        writer.finish()
    }
}

impl Timed for MorphKeyframe {
    fn frame_index(&self) -> f32 {
        self.frame_index
    }
}

/// 相机关键帧
#[derive(Clone, Debug)]
pub struct CameraKeyframe {
    pub frame_index: f32,
    pub distance: f32,
    pub position: Vec3,
    /// 欧拉角（弧度）
    pub angle: Vec3,
    pub fov: u32,
    /// 0 表示透视
    pub perspective: u8,
    interpolation: [u8; 24],
    pub interp_x: InterpolationCurve,
    pub interp_y: InterpolationCurve,
    pub interp_z: InterpolationCurve,
    pub interp_rotation: InterpolationCurve,
    pub interp_distance: InterpolationCurve,
    pub interp_fov: InterpolationCurve,
}

impl CameraKeyframe {
    pub fn new(frame_index: f32) -> Self {
        let mut interpolation = [0u8; 24];
        for channel in interpolation.chunks_exact_mut(4) {
            channel.copy_from_slice(&[20, 107, 20, 107]);
        }
        Self::with_interpolation(frame_index, interpolation)
    }

    /// 使用 VMD 格式的 24 字节插值表创建（每通道 x1, x2, y1, y2）
    pub fn with_interpolation(frame_index: f32, interpolation: [u8; 24]) -> Self {
        let curve = |channel: usize| {
            let base = channel * 4;
            InterpolationCurve::new(
                interpolation[base],
                interpolation[base + 2],
                interpolation[base + 1],
                interpolation[base + 3],
            )
        };
        Self {
            frame_index,
            distance: 0.0,
            position: Vec3::ZERO,
            angle: Vec3::ZERO,
            fov: 30,
            perspective: 0,
            interpolation,
            interp_x: curve(0),
            interp_y: curve(1),
            interp_z: curve(2),
            interp_rotation: curve(3),
            interp_distance: curve(4),
            interp_fov: curve(5),
        }
    }

    pub fn read(record: &[u8], handedness: Handedness) -> Self {
        let mut reader = FieldReader::new(record);
        let frame_index = reader.u32() as f32;
        let distance = reader.f32();
        let position = handedness.position(reader.vec3());
        let angle = handedness.euler(reader.vec3());
        let mut keyframe = Self::with_interpolation(frame_index, reader.bytes());
        keyframe.distance = distance;
        keyframe.position = position;
        keyframe.angle = angle;
        keyframe.fov = reader.u32();
        keyframe.perspective = reader.u8();
        keyframe
    }

    pub fn to_bytes(&self, handedness: Handedness) -> [u8; CAMERA_KEYFRAME_STRIDE] {
        let mut writer = FieldWriter::new();
        writer.u32(self.frame_index as u32);
        writer.f32(self.distance);
        writer.vec3(handedness.position(self.position));
        writer.vec3(handedness.euler(self.angle));
        writer.bytes(&self.interpolation);
        writer.u32(self.fov);
        writer.u8(self.perspective);
        writer.finish()
    }

    pub fn is_perspective(&self) -> bool {
        self.perspective == 0
    }
}

impl Timed for CameraKeyframe {
    fn frame_index(&self) -> f32 {
        self.frame_index
    }
}

/// 照明关键帧
#[derive(Clone, Debug)]
pub struct LightKeyframe {
    pub frame_index: f32,
    pub color: Vec3,
    pub direction: Vec3,
}

impl LightKeyframe {
    pub fn read(record: &[u8], handedness: Handedness) -> Self {
        let mut reader = FieldReader::new(record);
        Self {
            frame_index: reader.u32() as f32,
            color: reader.vec3(),
            direction: handedness.position(reader.vec3()),
        }
    }

    pub fn to_bytes(&self, handedness: Handedness) -> [u8; LIGHT_KEYFRAME_STRIDE] {
        let mut writer = FieldWriter::new();
        writer.u32(self.frame_index as u32);
        writer.vec3(self.color);
        writer.vec3(handedness.position(self.direction));
        writer.finish()
    }
}

impl Timed for LightKeyframe {
    fn frame_index(&self) -> f32 {
        self.frame_index
    }
}

/// 本影关键帧
#[derive(Clone, Debug, PartialEq)]
pub struct SelfShadowKeyframe {
    pub frame_index: f32,
    pub mode: u8,
    pub distance: f32,
}

impl SelfShadowKeyframe {
    pub fn read(record: &[u8]) -> Self {
        let mut reader = FieldReader::new(record);
        Self {
            frame_index: reader.u32() as f32,
            mode: reader.u8(),
            distance: reader.f32(),
        }
    }

    pub fn to_bytes(&self) -> [u8; SELF_SHADOW_KEYFRAME_STRIDE] {
        let mut writer = FieldWriter::new();
        writer.u32(self.frame_index as u32);
        writer.u8(self.mode);
        writer.f32(self.distance);
        writer.finish()
    }
}

impl Timed for SelfShadowKeyframe {
    fn frame_index(&self) -> f32 {
        self.frame_index
    }
}

/// 任意种类的关键帧
#[derive(Clone, Debug)]
pub enum Keyframe {
    Bone(BoneKeyframe),
    Morph(MorphKeyframe),
    Camera(CameraKeyframe),
    Light(LightKeyframe),
    SelfShadow(SelfShadowKeyframe),
}

impl Keyframe {
    pub fn frame_index(&self) -> f32 {
        match self {
            Keyframe::Bone(k) => k.frame_index,
            Keyframe::Morph(k) => k.frame_index,
            Keyframe::Camera(k) => k.frame_index,
            Keyframe::Light(k) => k.frame_index,
            Keyframe::SelfShadow(k) => k.frame_index,
        }
    }

    /// 写回该种类的定长记录
    pub fn to_bytes(&self, handedness: Handedness) -> Vec<u8> {
        match self {
            Keyframe::Bone(k) => k.to_bytes(handedness).to_vec(),
            Keyframe::Morph(k) => k.to_bytes().to_vec(),
            Keyframe::Camera(k) => k.to_bytes(handedness).to_vec(),
            Keyframe::Light(k) => k.to_bytes(handedness).to_vec(),
            Keyframe::SelfShadow(k) => k.to_bytes().to_vec(),
        }
    }
}
