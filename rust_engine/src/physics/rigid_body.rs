//! 刚体描述
//!
//! 只保存物理引擎建立刚体所需的数据，不包含模拟本身。

use glam::{Mat4, Quat, Vec3};

use crate::binary::{FieldReader, FixedString};
use crate::config::Handedness;
use crate::skeleton::resolve_link;

/// PMD 刚体记录大小
pub const RIGID_BODY_STRIDE: usize = 83;

/// 刚体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidBodyType {
    /// 静态/运动学刚体，跟随骨骼
    Kinematic,
    /// 动态刚体，完全由物理驱动
    Dynamic,
    /// 动态刚体，但位置跟随骨骼（只有旋转由物理驱动）
    DynamicWithBonePosition,
}

impl RigidBodyType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => RigidBodyType::Dynamic,
            2 => RigidBodyType::DynamicWithBonePosition,
            _ => RigidBodyType::Kinematic,
        }
    }

    /// 骨骼变换是否由物理系统提供
    pub fn drives_bone(self) -> bool {
        self != RigidBodyType::Kinematic
    }
}

/// 碰撞形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidBodyShape {
    Sphere,
    Box,
    Capsule,
}

impl RigidBodyShape {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => RigidBodyShape::Box,
            2 => RigidBodyShape::Capsule,
            _ => RigidBodyShape::Sphere,
        }
    }
}

/// 刚体描述
#[derive(Debug, Clone)]
pub struct RigidBodyDesc {
    pub name: FixedString<20>,
    /// 关联的骨骼索引
    pub bone_index: Option<usize>,
    /// 碰撞组
    pub group: u8,
    /// 碰撞掩码
    pub group_mask: u16,
    pub shape: RigidBodyShape,
    /// 球：x 为半径；盒：半边长；胶囊：x 半径，y 高度
    pub size: Vec3,
    /// 相对于关联骨骼原点的位置
    pub position: Vec3,
    /// 欧拉角（弧度）
    pub rotation: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    pub body_type: RigidBodyType,
}

impl RigidBodyDesc {
    pub(crate) fn read(record: &[u8], handedness: Handedness, bone_count: usize) -> Self {
        let mut reader = FieldReader::new(record);
        Self {
            name: FixedString::from_raw(reader.bytes()),
            bone_index: resolve_link(reader.i16(), bone_count),
            group: reader.u8(),
            group_mask: reader.u16(),
            shape: RigidBodyShape::from_raw(reader.u8()),
            size: reader.vec3(),
            position: handedness.position(reader.vec3()),
            rotation: handedness.euler(reader.vec3()),
            mass: reader.f32(),
            linear_damping: reader.f32(),
            angular_damping: reader.f32(),
            restitution: reader.f32(),
            friction: reader.f32(),
            body_type: RigidBodyType::from_raw(reader.u8()),
        }
    }

    /// 欧拉角转四元数（Y-X-Z 顺序）
    pub fn orientation(&self) -> Quat {
        let rx = Quat::from_rotation_x(self.rotation.x);
        let ry = Quat::from_rotation_y(self.rotation.y);
        let rz = Quat::from_rotation_z(self.rotation.z);
        ry * rx * rz
    }

    /// 绑定姿态下的世界变换（bone_origin 为关联骨骼的初始位置）
    pub fn world_transform(&self, bone_origin: Vec3) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation(), bone_origin + self.position)
    }
}
