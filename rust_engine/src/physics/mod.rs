//! 物理系统接口
//!
//! 刚体模拟由外部物理引擎实现。这里只定义：
//! - 模型提供给物理引擎的刚体/关节描述
//! - 每帧交换数据的接口：引擎读取骨骼状态，返回物理骨骼的世界变换

mod joint;
mod rigid_body;

pub use joint::{JointDesc, CONSTRAINT_STRIDE};
pub use rigid_body::{RigidBodyDesc, RigidBodyShape, RigidBodyType, RIGID_BODY_STRIDE};

use glam::Mat4;

use crate::skeleton::BoneManager;

/// 物理引擎后端
pub trait PhysicsBackend {
    /// 根据模型的刚体和关节建立模拟世界（骨骼处于绑定姿态）
    fn build(&mut self, rigid_bodies: &[RigidBodyDesc], joints: &[JointDesc], bones: &BoneManager);

    /// 把所有刚体放回当前骨骼姿态
    fn reset(&mut self, bones: &BoneManager);

    /// 推进模拟，返回物理骨骼的世界变换 `(骨骼索引, 变换)`
    fn step(&mut self, delta_time: f32, bones: &BoneManager) -> Vec<(usize, Mat4)>;
}

/// 由非运动学刚体驱动的骨骼索引（去重，升序）
pub fn simulated_bone_indices(rigid_bodies: &[RigidBodyDesc]) -> Vec<usize> {
    let mut indices: Vec<usize> = rigid_bodies
        .iter()
        .filter(|rb| rb.body_type.drives_bone())
        .filter_map(|rb| rb.bone_index)
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}
