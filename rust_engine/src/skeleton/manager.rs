//! 骨骼管理器

use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;

use super::bone::{effective_rotation, update_transform, update_transform_with};
use super::{Bone, IkSolver, ReservedNames};

/// 骨骼管理器
///
/// 骨骼保存在一个连续数组中，父/子/目标链接都是数组下标。
/// 没有父骨骼的骨骼挂在合成根节点下，根节点的平移/旋转代表整个模型的摆放。
pub struct BoneManager {
    bones: Vec<Bone>,
    root: Bone,
    name_to_index: HashMap<Vec<u8>, usize>,
    sorted_indices: Vec<usize>,
    /// 需要在 IK 之后做旋转传递的骨骼（按 sorted_indices 顺序）
    rotation_indices: Vec<usize>,
    ik_solvers: Vec<IkSolver>,
    skinning_matrices: Vec<Mat4>,
}

impl BoneManager {
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            root: Bone::default(),
            name_to_index: HashMap::new(),
            sorted_indices: Vec::new(),
            rotation_indices: Vec::new(),
            ik_solvers: Vec::new(),
            skinning_matrices: Vec::new(),
        }
    }

    /// 添加骨骼（重名时保留第一根）
    pub fn add_bone(&mut self, bone: Bone) {
        let index = self.bones.len();
        self.name_to_index
            .entry(bone.name.as_bytes().to_vec())
            .or_insert(index);
        self.bones.push(bone);
    }

    pub fn add_ik_solver(&mut self, solver: IkSolver) {
        self.ik_solvers.push(solver);
    }

    /// 构建骨骼层级：父骨骼偏移、逆绑定矩阵、更新顺序
    pub fn build_hierarchy(&mut self, reserved: &ReservedNames) {
        let bone_count = self.bones.len();

        for i in 0..bone_count {
            let pos = self.bones[i].initial_position;
            let parent = self.bones[i].parent;

            let offset = match parent {
                Some(p) => pos - self.bones[p].initial_position,
                None => pos,
            };
            let bone = &mut self.bones[i];
            bone.bone_offset = offset;
            bone.inverse_bind_matrix = Mat4::from_translation(-pos);
            bone.global_transform = Mat4::from_translation(pos);
            bone.motion_independent =
                parent.is_none() || reserved.is_motion_independent(bone.name.as_bytes());
        }

        self.sorted_indices = self.compute_update_order();
        self.rotation_indices = self
            .sorted_indices
            .iter()
            .copied()
            .filter(|&i| self.bones[i].kind.propagates_rotation())
            .collect();

        // 初始状态下 skinning_matrix = global * inverse_bind = I
        self.skinning_matrices = self.bones.iter().map(Bone::get_skinning_matrix).collect();
    }

    /// 父先子后的更新顺序：先放无父骨骼，再反复扫描加入父骨骼已就位的骨骼
    fn compute_update_order(&self) -> Vec<usize> {
        let bone_count = self.bones.len();
        let mut placed = vec![false; bone_count];
        let mut order = Vec::with_capacity(bone_count);

        for (i, bone) in self.bones.iter().enumerate() {
            if bone.parent.is_none() {
                placed[i] = true;
                order.push(i);
            }
        }

        while order.len() < bone_count {
            let before = order.len();
            for (i, bone) in self.bones.iter().enumerate() {
                if placed[i] {
                    continue;
                }
                if bone.parent.is_some_and(|p| placed[p]) {
                    placed[i] = true;
                    order.push(i);
                }
            }
            if order.len() == before {
                let rest: Vec<usize> = (0..bone_count).filter(|&i| !placed[i]).collect();
                log::warn!("Bone hierarchy contains a parent cycle, {} bones appended unordered", rest.len());
                order.extend(rest);
                break;
            }
        }
        order
    }

    /// 通过名称字节查找骨骼
    pub fn find_bone_by_name(&self, name: &[u8]) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 通过 UTF-8 名称查找骨骼（先编码为 Shift-JIS）
    pub fn find_bone_by_str(&self, name: &str) -> Option<usize> {
        self.find_bone_by_name(&crate::binary::encode_shift_jis(name))
    }

    /// 获取骨骼数量
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// 获取骨骼
    pub fn get_bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// 获取可变骨骼引用
    pub fn get_bone_mut(&mut self, index: usize) -> Option<&mut Bone> {
        self.bones.get_mut(index)
    }

    pub fn sorted_indices(&self) -> &[usize] {
        &self.sorted_indices
    }

    pub fn ik_solvers(&self) -> &[IkSolver] {
        &self.ik_solvers
    }

    pub fn ik_solvers_mut(&mut self) -> &mut [IkSolver] {
        &mut self.ik_solvers
    }

    /// 设置整个模型的摆放
    pub fn set_root_transform(&mut self, translation: Vec3, rotation: Quat) {
        self.root.animation_translate = translation;
        self.root.animation_rotate = rotation;
    }

    pub fn root_transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.root.animation_rotate, self.root.animation_translate)
    }

    /// 所有骨骼回到绑定姿态（根节点摆放不变）
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.reset_animation();
        }
    }

    /// 设置骨骼动画平移
    pub fn set_bone_translation(&mut self, index: usize, translation: Vec3) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.animation_translate = translation;
        }
    }

    /// 设置骨骼动画旋转
    pub fn set_bone_rotation(&mut self, index: usize, rotation: Quat) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.animation_rotate = rotation;
        }
    }

    /// 更新一根骨骼的变换（父骨骼必须已经更新）
    pub fn update_bone_transform(&mut self, index: usize) {
        if index < self.bones.len() {
            let root = self.root_transform();
            update_transform(&mut self.bones, index, &root);
        }
    }

    /// 更新全部骨骼变换
    ///
    /// 顺序：正向运动学 -> IK -> 旋转传递 -> 蒙皮矩阵。
    /// 物理驱动的骨骼在正向运动学中跳过，保留上一次注入的变换。
    pub fn update_transforms(&mut self) {
        let root = self.root_transform();

        for &idx in &self.sorted_indices {
            if self.bones[idx].simulated {
                continue;
            }
            update_transform(&mut self.bones, idx, &root);
        }

        for solver in &self.ik_solvers {
            solver.solve(&mut self.bones, &root);
        }

        if !self.rotation_indices.is_empty() {
            let mut dirty = vec![false; self.bones.len()];
            for &idx in &self.rotation_indices {
                dirty[idx] = true;
            }
            self.refresh_descendants(dirty, &root);
        }

        self.update_skinning_matrices();
    }

    /// 按更新顺序重算被标记骨骼及其所有后代（跳过物理骨骼）
    fn refresh_descendants(&mut self, mut dirty: Vec<bool>, root: &Mat4) {
        for &idx in &self.sorted_indices {
            if !dirty[idx] {
                dirty[idx] = self.bones[idx].parent.is_some_and(|p| dirty[p]);
            }
            if !dirty[idx] || self.bones[idx].simulated {
                continue;
            }
            let rotation = effective_rotation(&self.bones, idx);
            update_transform_with(&mut self.bones, idx, rotation, root);
        }
    }

    fn update_skinning_matrices(&mut self) {
        for (matrix, bone) in self.skinning_matrices.iter_mut().zip(&self.bones) {
            *matrix = bone.get_skinning_matrix();
        }
    }

    /// 获取全局变换
    pub fn get_global_transform(&self, index: usize) -> Mat4 {
        self.bones.get(index).map(|b| b.global_transform).unwrap_or(Mat4::IDENTITY)
    }

    /// 获取蒙皮矩阵数组
    pub fn get_skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }

    /// 标记由物理系统驱动的骨骼
    pub fn set_simulated_bones(&mut self, indices: &[usize]) {
        for bone in &mut self.bones {
            bone.simulated = false;
        }
        for &idx in indices {
            if let Some(bone) = self.bones.get_mut(idx) {
                bone.simulated = true;
            }
        }
    }

    pub fn clear_simulated_bones(&mut self) {
        self.set_simulated_bones(&[]);
    }

    /// 注入物理系统计算的世界变换
    ///
    /// 只修改该骨骼本身，子骨骼在 [`Self::update_after_physics`] 中统一更新。
    pub fn apply_physics_transform(&mut self, index: usize, transform: Mat4) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.global_transform = transform;
        }
    }

    /// 物理注入后，重算物理骨骼的非物理后代并刷新蒙皮矩阵
    pub fn update_after_physics(&mut self) {
        let root = self.root_transform();
        let dirty = self.bones.iter().map(|b| b.simulated).collect();
        self.refresh_descendants(dirty, &root);
        self.update_skinning_matrices();
    }

    /// 骨骼是否属于某条 IK 链
    pub fn is_ik_link(&self, index: usize) -> bool {
        self.ik_solvers
            .iter()
            .any(|s| s.links.iter().any(|l| l.bone_index == index))
    }

    /// 旋转传递骨骼数量
    pub fn rotation_bone_count(&self) -> usize {
        self.rotation_indices.len()
    }
}

impl Default for BoneManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{BoneKind, BoneName, IkLink, CENTER_BONE_NAME};

    fn bone(id: usize, name: &str, parent: Option<usize>, position: Vec3) -> Bone {
        let mut bone = Bone::new(id, BoneName::encode(name));
        bone.parent = parent;
        bone.initial_position = position;
        bone
    }

    fn chain() -> BoneManager {
        let mut manager = BoneManager::new();
        // 子骨骼排在父骨骼前面，检验排序
        manager.add_bone(bone(0, "hand", Some(2), Vec3::new(0.0, 2.0, 0.0)));
        manager.add_bone(bone(1, "root", None, Vec3::ZERO));
        manager.add_bone(bone(2, "elbow", Some(1), Vec3::new(0.0, 1.0, 0.0)));
        manager.build_hierarchy(&ReservedNames::DEFAULT);
        manager
    }

    #[test]
    fn test_parent_before_child_order() {
        let manager = chain();
        assert_eq!(manager.sorted_indices(), &[1, 2, 0]);
    }

    #[test]
    fn test_offsets_and_flags() {
        let manager = chain();
        let hand = manager.get_bone(0).unwrap();
        assert_eq!(hand.bone_offset, Vec3::new(0.0, 1.0, 0.0));
        assert!(!hand.motion_independent);
        let root = manager.get_bone(1).unwrap();
        assert_eq!(root.bone_offset, Vec3::ZERO);
        assert!(root.motion_independent);
    }

    #[test]
    fn test_reserved_name_is_motion_independent() {
        let mut manager = BoneManager::new();
        manager.add_bone(bone(0, "root", None, Vec3::ZERO));
        let mut center = Bone::new(1, BoneName::from_bytes(CENTER_BONE_NAME));
        center.parent = Some(0);
        manager.add_bone(center);
        manager.build_hierarchy(&ReservedNames::DEFAULT);
        assert!(manager.get_bone(1).unwrap().motion_independent);

        manager.build_hierarchy(&ReservedNames::NONE);
        assert!(!manager.get_bone(1).unwrap().motion_independent);
    }

    #[test]
    fn test_bind_pose_skinning_is_identity() {
        let mut manager = chain();
        manager.update_transforms();
        for matrix in manager.get_skinning_matrices() {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        }
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut manager = chain();
        manager.set_bone_rotation(2, Quat::from_rotation_z(0.4));
        manager.set_bone_translation(1, Vec3::new(0.5, 0.0, 0.0));
        manager.update_transforms();
        let first: Vec<Mat4> = manager.bones().iter().map(|b| b.global_transform).collect();
        manager.update_transforms();
        let second: Vec<Mat4> = manager.bones().iter().map(|b| b.global_transform).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_root_places_whole_model() {
        let mut manager = chain();
        manager.set_root_transform(Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY);
        manager.update_transforms();
        let hand = manager.get_global_transform(0);
        assert!(hand.w_axis.truncate().abs_diff_eq(Vec3::new(10.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let mut manager = BoneManager::new();
        manager.add_bone(bone(0, "dup", None, Vec3::ZERO));
        manager.add_bone(bone(1, "dup", None, Vec3::ONE));
        assert_eq!(manager.find_bone_by_str("dup"), Some(0));
        assert_eq!(manager.find_bone_by_str("missing"), None);
    }

    #[test]
    fn test_parent_cycle_still_orders_all_bones() {
        let mut manager = BoneManager::new();
        manager.add_bone(bone(0, "a", Some(1), Vec3::ZERO));
        manager.add_bone(bone(1, "b", Some(0), Vec3::ZERO));
        manager.add_bone(bone(2, "c", None, Vec3::ZERO));
        manager.build_hierarchy(&ReservedNames::NONE);
        assert_eq!(manager.sorted_indices(), &[2, 0, 1]);
    }

    #[test]
    fn test_under_rotate_second_pass() {
        let mut manager = chain();
        let mut eye = bone(3, "eye", Some(2), Vec3::new(0.0, 1.5, 0.0));
        eye.kind = BoneKind::UnderRotate;
        eye.target = Some(1);
        manager.add_bone(eye);
        manager.build_hierarchy(&ReservedNames::NONE);
        assert_eq!(manager.rotation_bone_count(), 1);

        manager.set_bone_rotation(1, Quat::from_rotation_y(0.3));
        manager.update_transforms();
        let (_, rotation, _) = manager.get_global_transform(3).to_scale_rotation_translation();
        // 父链旋转 0.3 + 目标骨骼旋转 0.3
        assert!(rotation.abs_diff_eq(Quat::from_rotation_y(0.6), 1e-5));
    }

    #[test]
    fn test_ik_runs_inside_update() {
        let mut manager = chain();
        manager.add_bone(bone(3, "ik", None, Vec3::new(1.0, 1.0, 0.0)));
        manager.build_hierarchy(&ReservedNames::NONE);
        let links = vec![IkLink { bone_index: 2, axis_locked: false }];
        manager.add_ik_solver(IkSolver::new(3, 0, links, 8, std::f32::consts::PI));
        assert!(manager.is_ik_link(2));

        manager.update_transforms();
        let hand = manager.get_global_transform(0).w_axis.truncate();
        assert!(hand.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-3));
    }

    #[test]
    fn test_physics_transform_drives_children() {
        let mut manager = chain();
        manager.set_simulated_bones(&[2]);
        manager.update_transforms();

        let moved = Mat4::from_translation(Vec3::new(5.0, 1.0, 0.0));
        manager.apply_physics_transform(2, moved);
        manager.update_after_physics();

        assert_eq!(manager.get_global_transform(2), moved);
        let hand = manager.get_global_transform(0).w_axis.truncate();
        assert!(hand.abs_diff_eq(Vec3::new(5.0, 2.0, 0.0), 1e-6));

        // 运动学更新不会覆盖物理骨骼
        manager.update_transforms();
        assert_eq!(manager.get_global_transform(2), moved);
        manager.clear_simulated_bones();
        manager.update_transforms();
        assert!(manager.get_skinning_matrices()[2].abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
