//! 关节（约束）描述
//!
//! 6 自由度弹簧约束的参数，连接两个刚体。

use glam::{Mat4, Quat, Vec3};

use crate::binary::{FieldReader, FixedString};
use crate::config::Handedness;

/// PMD 约束记录大小
pub const CONSTRAINT_STRIDE: usize = 124;

/// 关节描述
#[derive(Debug, Clone)]
pub struct JointDesc {
    pub name: FixedString<20>,
    /// 刚体 A 索引
    pub rigid_body_a: usize,
    /// 刚体 B 索引
    pub rigid_body_b: usize,
    pub position: Vec3,
    pub rotation: Vec3,
    /// 线性下限
    pub linear_lower: Vec3,
    /// 线性上限
    pub linear_upper: Vec3,
    /// 角度下限
    pub angular_lower: Vec3,
    /// 角度上限
    pub angular_upper: Vec3,
    /// 线性弹簧刚度
    pub linear_spring: Vec3,
    /// 角度弹簧刚度
    pub angular_spring: Vec3,
}

impl JointDesc {
    pub(crate) fn read(record: &[u8], handedness: Handedness) -> Self {
        let mut reader = FieldReader::new(record);
        let name = FixedString::from_raw(reader.bytes());
        let rigid_body_a = reader.u32() as usize;
        let rigid_body_b = reader.u32() as usize;
        let position = handedness.position(reader.vec3());
        let rotation = handedness.euler(reader.vec3());
        let (linear_lower, linear_upper) = handedness.position_range(reader.vec3(), reader.vec3());
        let (angular_lower, angular_upper) = handedness.euler_range(reader.vec3(), reader.vec3());
        Self {
            name,
            rigid_body_a,
            rigid_body_b,
            position,
            rotation,
            linear_lower,
            linear_upper,
            angular_lower,
            angular_upper,
            linear_spring: reader.vec3(),
            angular_spring: reader.vec3(),
        }
    }

    /// 关节的世界变换（Z-Y-X 顺序）
    pub fn world_transform(&self) -> Mat4 {
        let rx = Quat::from_rotation_x(self.rotation.x);
        let ry = Quat::from_rotation_y(self.rotation.y);
        let rz = Quat::from_rotation_z(self.rotation.z);
        Mat4::from_rotation_translation(rz * ry * rx, self.position)
    }

    /// 刚体索引是否都在范围内
    pub fn is_connected(&self, rigid_body_count: usize) -> bool {
        self.rigid_body_a < rigid_body_count && self.rigid_body_b < rigid_body_count
    }
}
