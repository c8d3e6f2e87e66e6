//! IK 求解器（循环坐标下降）

use std::f32::consts::PI;

use glam::{EulerRot, Mat4, Quat, Vec3};

use super::bone::{resolve_link, update_transform, Bone};
use crate::binary::FieldReader;

/// IK 记录头部：目标骨骼 2 + 效应骨骼 2 + 链长 1 + 迭代次数 2 + 控制权重 4
pub const IK_HEADER_SIZE: usize = 11;
pub const IK_LINK_STRIDE: usize = 2;

const MIN_DISTANCE: f32 = 0.0001;
const MIN_ANGLE: f32 = 0.000_000_01;
const MIN_AXIS: f32 = 0.000_000_1;
const MIN_ROTATION_SUM: f32 = 0.002;
const MIN_ROTATION: f32 = 0.000_01;

/// IK 记录（未解析）
#[derive(Clone, Debug)]
pub(crate) struct RawIkChain {
    pub destination: i16,
    pub target: i16,
    pub iterations: u16,
    pub control_weight: f32,
    pub links: Vec<i16>,
}

impl RawIkChain {
    /// 读取一条变长记录，返回记录和消耗的字节数
    pub fn read(bytes: &[u8]) -> (Self, usize) {
        let mut reader = FieldReader::new(bytes);
        let destination = reader.i16();
        let target = reader.i16();
        let link_count = reader.u8() as usize;
        let iterations = reader.u16();
        let control_weight = reader.f32();
        let links = (0..link_count).map(|_| reader.i16()).collect();
        let chain = Self {
            destination,
            target,
            iterations,
            control_weight,
            links,
        };
        (chain, reader.offset())
    }
}

/// IK 链接信息
#[derive(Clone, Debug, PartialEq)]
pub struct IkLink {
    pub bone_index: usize,
    /// 膝盖类骨骼：只绕 X 轴旋转，且角度单向
    pub axis_locked: bool,
}

/// IK 求解器
#[derive(Clone, Debug)]
pub struct IkSolver {
    /// IK 骨骼（目的地）
    pub destination: usize,
    /// 需要到达目的地的骨骼
    pub target: usize,
    /// 从末端到根的链接骨骼
    pub links: Vec<IkLink>,
    pub iterations: u16,
    /// 单次旋转角度上限（弧度）
    pub angle_constraint: f32,
    /// 膝盖弯曲方向：右手坐标系下为正
    pub hinge_direction: f32,
    pub enabled: bool,
}

impl IkSolver {
    pub fn new(destination: usize, target: usize, links: Vec<IkLink>, iterations: u16, angle_constraint: f32) -> Self {
        Self {
            destination,
            target,
            links,
            iterations,
            angle_constraint,
            hinge_direction: 1.0,
            enabled: true,
        }
    }

    /// 解析骨骼引用；目的地或效应骨骼无效时整条链丢弃
    pub(crate) fn from_raw(raw: &RawIkChain, bones: &[Bone], is_axis_locked: impl Fn(&[u8]) -> bool) -> Option<Self> {
        let destination = resolve_link(raw.destination, bones.len())?;
        let target = resolve_link(raw.target, bones.len())?;
        let links = raw
            .links
            .iter()
            .filter_map(|&id| resolve_link(id, bones.len()))
            .map(|bone_index| IkLink {
                bone_index,
                axis_locked: is_axis_locked(bones[bone_index].name.as_bytes()),
            })
            .collect();
        Some(Self::new(destination, target, links, raw.iterations, raw.control_weight * PI))
    }

    /// 求解 IK
    ///
    /// 修改链接骨骼的旋转；效应骨骼的旋转在结束时恢复。
    /// 迭代次数用完仍未收敛时保持当前姿态，不报告失败。
    pub fn solve(&self, bones: &mut [Bone], root: &Mat4) {
        if !self.enabled {
            return;
        }

        let destination_position = bones[self.destination].world_position();

        // 根在链表末尾，逆序更新保证父先子后
        for link in self.links.iter().rev() {
            update_transform(bones, link.bone_index, root);
        }
        update_transform(bones, self.target, root);
        let original_target_rotation = bones[self.target].animation_rotate;

        'iterations: for iteration in 0..self.iterations {
            for (j, link) in self.links.iter().enumerate() {
                let bone_index = link.bone_index;
                let target_position = bones[self.target].world_position();
                let inverse = bones[bone_index].global_transform.inverse();
                let local_destination = inverse.transform_point3(destination_position);
                let local_target = inverse.transform_point3(target_position);

                if local_destination.distance_squared(local_target) < MIN_DISTANCE {
                    break 'iterations;
                }

                let local_destination = local_destination.normalize_or_zero();
                let local_target = local_target.normalize_or_zero();
                let dot = local_destination.dot(local_target);
                if dot > 1.0 {
                    continue;
                }

                let angle = dot.max(-1.0).acos();
                if angle.abs() < MIN_ANGLE {
                    continue;
                }
                let angle = clamp_symmetric(angle, self.angle_constraint);

                let axis = local_target.cross(local_destination);
                if axis.length_squared() < MIN_AXIS && iteration > 0 {
                    continue;
                }
                let axis = axis.normalize_or_zero();

                if link.axis_locked {
                    let delta = if iteration == 0 {
                        Quat::from_axis_angle(Vec3::X, angle.abs() * self.hinge_direction)
                    } else {
                        let proposed = Quat::from_axis_angle(axis, angle);
                        match self.constrain_hinge(proposed, bones[bone_index].animation_rotate) {
                            Some(delta) => delta,
                            None => continue,
                        }
                    };
                    let bone = &mut bones[bone_index];
                    bone.animation_rotate = delta * bone.animation_rotate;
                } else {
                    if axis == Vec3::ZERO {
                        continue;
                    }
                    let delta = Quat::from_axis_angle(axis, angle);
                    let bone = &mut bones[bone_index];
                    bone.animation_rotate = bone.animation_rotate * delta;
                }

                for k in (0..=j).rev() {
                    update_transform(bones, self.links[k].bone_index, root);
                }
                update_transform(bones, self.target, root);
            }
        }

        bones[self.target].animation_rotate = original_target_rotation;
        update_transform(bones, self.target, root);
    }

    /// 膝盖约束：X 轴累计角度限制在 [MIN_ROTATION_SUM, PI]
    ///
    /// 返回 None 表示本次旋转太小，跳过该链接。
    fn constrain_hinge(&self, proposed: Quat, current: Quat) -> Option<Quat> {
        let (_, _, x) = proposed.to_euler(EulerRot::ZYX);
        let (_, _, cx) = current.to_euler(EulerRot::ZYX);
        // 换算到右手坐标系下的角度再限制
        let mut x = x * self.hinge_direction;
        let cx = cx * self.hinge_direction;

        if x + cx > PI {
            x = PI - cx;
        }
        if MIN_ROTATION_SUM > x + cx {
            x = MIN_ROTATION_SUM - cx;
        }
        let x = clamp_symmetric(x, self.angle_constraint);
        if x.abs() < MIN_ROTATION {
            return None;
        }
        Some(Quat::from_rotation_x(x * self.hinge_direction))
    }
}

/// 限制到 [-limit, limit]；limit 为负或 NaN 时不会 panic
fn clamp_symmetric(value: f32, limit: f32) -> f32 {
    if value < -limit {
        -limit
    } else if value > limit {
        limit
    } else {
        value
    }
}
