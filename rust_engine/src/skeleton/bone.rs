//! 骨骼节点

use glam::{Mat4, Quat, Vec3};

use crate::binary::{FieldReader, FixedString};
use crate::config::Handedness;

/// PMD 骨骼名称（20 字节）
pub type BoneName = FixedString<20>;

/// PMD 骨骼记录大小
pub const BONE_STRIDE: usize = 39;

/// 骨骼类型（PMD 类型码 0-9）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoneKind {
    Rotate,
    RotateAndMove,
    IkDestination,
    Unknown,
    UnderIk,
    UnderRotate,
    IkTarget,
    Invisible,
    Twist,
    FollowRotate,
}

impl BoneKind {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => BoneKind::Rotate,
            1 => BoneKind::RotateAndMove,
            2 => BoneKind::IkDestination,
            4 => BoneKind::UnderIk,
            5 => BoneKind::UnderRotate,
            6 => BoneKind::IkTarget,
            7 => BoneKind::Invisible,
            8 => BoneKind::Twist,
            9 => BoneKind::FollowRotate,
            _ => BoneKind::Unknown,
        }
    }

    /// 需要在 IK 之后进行旋转传递的骨骼
    pub fn propagates_rotation(self) -> bool {
        matches!(self, BoneKind::UnderRotate | BoneKind::FollowRotate)
    }
}

/// 未解析链接的骨骼记录
#[derive(Clone, Debug)]
pub(crate) struct RawBone {
    pub name: BoneName,
    pub parent: i16,
    pub child: i16,
    pub kind: u8,
    pub target: i16,
    pub position: Vec3,
}

impl RawBone {
    pub fn read(record: &[u8], handedness: Handedness) -> Self {
        let mut reader = FieldReader::new(record);
        Self {
            name: BoneName::from_raw(reader.bytes()),
            parent: reader.i16(),
            child: reader.i16(),
            kind: reader.u8(),
            target: reader.i16(),
            position: handedness.position(reader.vec3()),
        }
    }
}

/// 把记录中的骨骼索引解析为数组下标，越界（含 -1）视为无链接
pub(crate) fn resolve_link(raw: i16, bone_count: usize) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&index| index < bone_count)
}

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct Bone {
    pub id: usize,
    pub name: BoneName,
    pub english_name: Option<BoneName>,
    pub kind: BoneKind,

    pub parent: Option<usize>,
    pub child: Option<usize>,
    /// UnderRotate 的旋转来源骨骼
    pub target: Option<usize>,
    /// FollowRotate 的跟随系数（记录中的 target 字段 * 0.01）
    pub rotate_coef: f32,

    // 初始位置（模型空间）
    pub initial_position: Vec3,
    // 相对于父骨骼的偏移（在 build_hierarchy 中计算）
    pub bone_offset: Vec3,
    // 逆绑定矩阵 = 平移(-initial_position)
    pub inverse_bind_matrix: Mat4,
    pub motion_independent: bool,

    // 动画状态
    pub animation_translate: Vec3,
    pub animation_rotate: Quat,

    /// 当前变换（已乘上父骨骼变换）
    pub global_transform: Mat4,
    /// 变换由物理系统提供
    pub simulated: bool,
}

impl Bone {
    pub fn new(id: usize, name: BoneName) -> Self {
        Self {
            id,
            name,
            english_name: None,
            kind: BoneKind::Rotate,
            parent: None,
            child: None,
            target: None,
            rotate_coef: 0.0,
            initial_position: Vec3::ZERO,
            bone_offset: Vec3::ZERO,
            inverse_bind_matrix: Mat4::IDENTITY,
            motion_independent: false,
            animation_translate: Vec3::ZERO,
            animation_rotate: Quat::IDENTITY,
            global_transform: Mat4::IDENTITY,
            simulated: false,
        }
    }

    /// 从记录构建并解析链接（链接针对同一批骨骼的数量）
    pub(crate) fn from_raw(id: usize, raw: &RawBone, bone_count: usize) -> Self {
        let kind = BoneKind::from_raw(raw.kind);
        let mut bone = Self::new(id, raw.name);
        bone.kind = kind;
        bone.parent = resolve_link(raw.parent, bone_count);
        bone.child = resolve_link(raw.child, bone_count);
        bone.initial_position = raw.position;

        // FollowRotate 复用 target 字段存放系数
        if kind == BoneKind::FollowRotate {
            bone.rotate_coef = raw.target as f32 * 0.01;
        } else {
            bone.target = resolve_link(raw.target, bone_count);
        }
        bone
    }

    /// 重置动画状态
    pub fn reset_animation(&mut self) {
        self.animation_translate = Vec3::ZERO;
        self.animation_rotate = Quat::IDENTITY;
    }

    /// 世界空间原点
    pub fn world_position(&self) -> Vec3 {
        self.global_transform.w_axis.truncate()
    }

    /// 获取蒙皮矩阵 = 当前全局变换 * 逆绑定矩阵
    pub fn get_skinning_matrix(&self) -> Mat4 {
        self.global_transform * self.inverse_bind_matrix
    }
}

impl Default for Bone {
    fn default() -> Self {
        Self::new(0, BoneName::default())
    }
}

/// 用给定旋转重新计算一根骨骼的变换
///
/// 父骨骼必须先于子骨骼更新；无父骨骼时挂在根变换下。
pub(crate) fn update_transform_with(bones: &mut [Bone], index: usize, rotation: Quat, root: &Mat4) {
    let bone = &bones[index];
    let local = Mat4::from_rotation_translation(rotation, bone.animation_translate + bone.bone_offset);
    let parent = bone.parent.map_or(*root, |p| bones[p].global_transform);
    bones[index].global_transform = parent * local;
}

pub(crate) fn update_transform(bones: &mut [Bone], index: usize, root: &Mat4) {
    let rotation = bones[index].animation_rotate;
    update_transform_with(bones, index, rotation, root);
}

/// 考虑旋转传递后的实际旋转
pub(crate) fn effective_rotation(bones: &[Bone], index: usize) -> Quat {
    let bone = &bones[index];
    match bone.kind {
        BoneKind::UnderRotate => match bone.target {
            Some(target) => bone.animation_rotate * bones[target].animation_rotate,
            None => bone.animation_rotate,
        },
        BoneKind::FollowRotate => match bone.child {
            Some(child) => {
                bone.animation_rotate
                    * Quat::IDENTITY.slerp(bones[child].animation_rotate, bone.rotate_coef)
            }
            None => bone.animation_rotate,
        },
        _ => bone.animation_rotate,
    }
}
