//! PMD 运行时模型

use glam::{Mat4, Quat, Vec3};

use crate::animation::Motion;
use crate::binary::FixedString;
use crate::morph::MorphManager;
use crate::physics::{simulated_bone_indices, JointDesc, PhysicsBackend, RigidBodyDesc};
use crate::skeleton::BoneManager;

use super::{BoneDisplay, CategoryName, PmdMaterial, RuntimeVertex, TextureName, VertexWeight};

/// PMD 运行时模型
pub struct PmdModel {
    // 静态数据
    pub name: FixedString<20>,
    pub comment: FixedString<256>,
    pub english_name: Option<FixedString<20>>,
    pub english_comment: Option<FixedString<256>>,
    pub vertices: Vec<RuntimeVertex>,
    pub indices: Vec<u32>,
    pub weights: Vec<VertexWeight>,
    pub materials: Vec<PmdMaterial>,
    /// 表情显示列表（表情索引）
    pub face_display: Vec<u16>,
    pub bone_category_names: Vec<CategoryName>,
    pub english_bone_category_names: Vec<CategoryName>,
    pub bone_display: Vec<BoneDisplay>,
    pub custom_textures: Option<Vec<TextureName>>,
    pub rigid_bodies: Vec<RigidBodyDesc>,
    pub joints: Vec<JointDesc>,

    // 运行时数据：Morph 混合后的顶点位置（蒙皮前）
    pub update_positions: Vec<Vec3>,

    // 子系统
    pub bone_manager: BoneManager,
    pub morph_manager: MorphManager,

    // 物理系统
    physics: Option<Box<dyn PhysicsBackend>>,
    physics_enabled: bool,
}

impl PmdModel {
    /// 创建空模型
    pub fn new() -> Self {
        Self {
            name: FixedString::default(),
            comment: FixedString::default(),
            english_name: None,
            english_comment: None,
            vertices: Vec::new(),
            indices: Vec::new(),
            weights: Vec::new(),
            materials: Vec::new(),
            face_display: Vec::new(),
            bone_category_names: Vec::new(),
            english_bone_category_names: Vec::new(),
            bone_display: Vec::new(),
            custom_textures: None,
            rigid_bodies: Vec::new(),
            joints: Vec::new(),
            update_positions: Vec::new(),
            bone_manager: BoneManager::new(),
            morph_manager: MorphManager::new(),
            physics: None,
            physics_enabled: false,
        }
    }

    /// 获取顶点数量
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// 获取索引数量
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// 获取材质数量
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn bone_count(&self) -> usize {
        self.bone_manager.bone_count()
    }

    pub fn morph_count(&self) -> usize {
        self.morph_manager.morph_count()
    }

    /// 设置模型整体摆放（合成根节点）
    pub fn set_root_transform(&mut self, translation: Vec3, rotation: Quat) {
        self.bone_manager.set_root_transform(translation, rotation);
    }

    /// 骨骼和表情回到初始状态
    pub fn reset_pose(&mut self) {
        self.bone_manager.reset_pose();
        self.morph_manager.reset_all_weights();
        self.restore_rest_positions();
    }

    fn restore_rest_positions(&mut self) {
        for (position, vertex) in self.update_positions.iter_mut().zip(&self.vertices) {
            *position = vertex.position;
        }
    }

    /// 更新 Morph 混合后的顶点位置
    ///
    /// 每次都从静止位置重新混合，Base 之外的顶点不会累积位移。
    pub fn update_morphs(&mut self) {
        self.restore_rest_positions();
        self.morph_manager.apply_morphs(&mut self.update_positions);
    }

    /// 更新骨骼变换（正向运动学、IK、旋转传递、蒙皮矩阵）
    pub fn update_transforms(&mut self) {
        self.bone_manager.update_transforms();
    }

    /// 完整更新：Morph + 骨骼
    pub fn update(&mut self) {
        self.update_morphs();
        self.update_transforms();
    }

    /// 把动作绑定到本模型
    pub fn attach_motion(&self, motion: &mut Motion) {
        motion.attach(&self.bone_manager, &self.morph_manager);
    }

    /// 推进动作并更新模型
    pub fn advance_motion(&mut self, motion: &mut Motion, delta_frame: f32) {
        motion.advance(delta_frame, &mut self.bone_manager, &mut self.morph_manager);
        self.update();
    }

    /// 跳转到动作的指定帧并更新模型
    pub fn seek_motion(&mut self, motion: &mut Motion, frame: f32) {
        motion.seek(frame, &mut self.bone_manager, &mut self.morph_manager);
        self.update();
    }

    /// 获取蒙皮矩阵数组
    pub fn skinning_matrices(&self) -> &[Mat4] {
        self.bone_manager.get_skinning_matrices()
    }

    /// 单根骨骼的蒙皮矩阵
    pub fn skin_transform(&self, bone_index: usize) -> Option<Mat4> {
        self.bone_manager
            .get_bone(bone_index)
            .map(|bone| bone.get_skinning_matrix())
    }

    // ========== 物理系统方法 ==========

    /// 安装物理后端
    pub fn set_physics_backend(&mut self, mut backend: Box<dyn PhysicsBackend>) {
        backend.build(&self.rigid_bodies, &self.joints, &self.bone_manager);
        let simulated = simulated_bone_indices(&self.rigid_bodies);
        log::info!(
            "Physics attached: {} rigid bodies, {} joints, {} simulated bones",
            self.rigid_bodies.len(),
            self.joints.len(),
            simulated.len()
        );
        self.bone_manager.set_simulated_bones(&simulated);
        self.physics = Some(backend);
        self.physics_enabled = true;
    }

    /// 移除物理后端，骨骼恢复为运动学计算
    pub fn remove_physics_backend(&mut self) -> Option<Box<dyn PhysicsBackend>> {
        self.bone_manager.clear_simulated_bones();
        self.physics_enabled = false;
        self.physics.take()
    }

    /// 重置物理系统
    pub fn reset_physics(&mut self) {
        if let Some(physics) = self.physics.as_mut() {
            physics.reset(&self.bone_manager);
        }
    }

    /// 启用/禁用物理
    pub fn set_physics_enabled(&mut self, enabled: bool) {
        self.physics_enabled = enabled;
        if enabled {
            let simulated = simulated_bone_indices(&self.rigid_bodies);
            self.bone_manager.set_simulated_bones(&simulated);
        } else {
            self.bone_manager.clear_simulated_bones();
        }
    }

    /// 获取物理是否启用
    pub fn is_physics_enabled(&self) -> bool {
        self.physics_enabled && self.physics.is_some()
    }

    /// 更新物理模拟（在 [`Self::update`] 之后调用）
    pub fn update_physics(&mut self, delta_time: f32) {
        if !self.physics_enabled {
            return;
        }
        let Some(physics) = self.physics.as_mut() else {
            return;
        };

        let transforms = physics.step(delta_time, &self.bone_manager);
        for (bone_index, transform) in transforms {
            self.bone_manager.apply_physics_transform(bone_index, transform);
        }
        self.bone_manager.update_after_physics();
    }
}

impl Default for PmdModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{RigidBodyShape, RigidBodyType};
    use crate::skeleton::{Bone, BoneName, ReservedNames};
    use std::cell::Cell;
    use std::rc::Rc;

    /// 把物理骨骼固定到一个给定位置
    struct FixedPhysics {
        target: Vec3,
        steps: Rc<Cell<usize>>,
    }

    impl PhysicsBackend for FixedPhysics {
        fn build(&mut self, rigid_bodies: &[RigidBodyDesc], _joints: &[JointDesc], _bones: &BoneManager) {
            assert_eq!(rigid_bodies.len(), 1);
        }

        fn reset(&mut self, _bones: &BoneManager) {}

        fn step(&mut self, _delta_time: f32, _bones: &BoneManager) -> Vec<(usize, Mat4)> {
            self.steps.set(self.steps.get() + 1);
            vec![(1, Mat4::from_translation(self.target))]
        }
    }

    fn model() -> PmdModel {
        let mut model = PmdModel::new();
        let mut root = Bone::new(0, BoneName::encode("root"));
        root.initial_position = Vec3::ZERO;
        let mut hair = Bone::new(1, BoneName::encode("hair"));
        hair.parent = Some(0);
        hair.initial_position = Vec3::new(0.0, 1.0, 0.0);
        let mut tip = Bone::new(2, BoneName::encode("tip"));
        tip.parent = Some(1);
        tip.initial_position = Vec3::new(0.0, 2.0, 0.0);
        model.bone_manager.add_bone(root);
        model.bone_manager.add_bone(hair);
        model.bone_manager.add_bone(tip);
        model.bone_manager.build_hierarchy(&ReservedNames::NONE);
        model.rigid_bodies.push(RigidBodyDesc {
            name: FixedString::default(),
            bone_index: Some(1),
            group: 0,
            group_mask: 0,
            shape: RigidBodyShape::Sphere,
            size: Vec3::ONE,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            mass: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            restitution: 0.0,
            friction: 0.0,
            body_type: RigidBodyType::Dynamic,
        });
        model
    }

    #[test]
    fn test_physics_overrides_kinematics() {
        let mut model = model();
        let steps = Rc::new(Cell::new(0));
        model.set_physics_backend(Box::new(FixedPhysics {
            target: Vec3::new(3.0, 1.0, 0.0),
            steps: steps.clone(),
        }));
        assert!(model.is_physics_enabled());

        model.update();
        model.update_physics(1.0 / 30.0);
        assert_eq!(steps.get(), 1);
        let tip = model.bone_manager.get_global_transform(2).w_axis.truncate();
        assert!(tip.abs_diff_eq(Vec3::new(3.0, 2.0, 0.0), 1e-6));

        model.set_physics_enabled(false);
        model.update_physics(1.0 / 30.0);
        assert_eq!(steps.get(), 1);
        model.update();
        let tip = model.bone_manager.get_global_transform(2).w_axis.truncate();
        assert!(tip.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-6));

        assert!(model.remove_physics_backend().is_some());
        assert!(!model.is_physics_enabled());
    }

    #[test]
    fn test_reset_pose_restores_positions() {
        let mut model = model();
        model.vertices.push(RuntimeVertex {
            position: Vec3::X,
            normal: Vec3::Y,
            uv: glam::Vec2::ZERO,
            edge_disabled: false,
        });
        model.update_positions = vec![Vec3::new(5.0, 5.0, 5.0)];
        model.bone_manager.set_bone_rotation(1, Quat::from_rotation_z(1.0));
        model.reset_pose();
        assert_eq!(model.update_positions[0], Vec3::X);
        assert_eq!(model.bone_manager.get_bone(1).unwrap().animation_rotate, Quat::IDENTITY);
    }
}
