//! 集成测试用的 PMD / VMD 缓冲区生成器

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use glam::{Quat, Vec3};

pub type Buf = Vec<u8>;

/// 写入定长名称（不足部分补 0）
pub fn write_name(buf: &mut Buf, name: &[u8], size: usize) {
    let mut field = vec![0u8; size];
    let len = name.len().min(size);
    field[..len].copy_from_slice(&name[..len]);
    buf.extend_from_slice(&field);
}

pub fn write_vec3(buf: &mut Buf, v: Vec3) {
    buf.write_f32::<LittleEndian>(v.x).unwrap();
    buf.write_f32::<LittleEndian>(v.y).unwrap();
    buf.write_f32::<LittleEndian>(v.z).unwrap();
}

#[derive(Clone, Debug)]
pub struct BoneSpec {
    pub name: Vec<u8>,
    pub parent: i16,
    pub child: i16,
    pub kind: u8,
    pub target: i16,
    pub position: Vec3,
}

impl BoneSpec {
    pub fn new(name: &[u8], parent: i16, position: Vec3) -> Self {
        Self {
            name: name.to_vec(),
            parent,
            child: -1,
            kind: 1,
            target: 0,
            position,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IkSpec {
    pub destination: i16,
    pub target: i16,
    pub iterations: u16,
    pub control_weight: f32,
    pub links: Vec<i16>,
}

#[derive(Clone, Debug)]
pub struct FaceSpec {
    pub name: Vec<u8>,
    pub kind: u8,
    pub vertices: Vec<(u32, Vec3)>,
}

/// PMD 缓冲区生成器
///
/// 三角形索引按 u16 写出；`trailing` 控制写到哪一个可选区域为止。
#[derive(Clone, Debug)]
pub struct PmdBuilder {
    pub name: Vec<u8>,
    pub version: f32,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u16>,
    pub material_index_counts: Vec<u32>,
    pub bones: Vec<BoneSpec>,
    pub ik_chains: Vec<IkSpec>,
    pub faces: Vec<FaceSpec>,
    pub trailing: Trailing,
    pub rigid_body_bones: Vec<i16>,
    pub constraint_count: u32,
}

/// 写出的最后一个可选区域
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Trailing {
    None,
    DisplayLists,
    EnglishNames,
    ToonTextures,
    Physics,
}

impl Default for PmdBuilder {
    fn default() -> Self {
        Self {
            name: b"model".to_vec(),
            version: 1.0,
            vertices: Vec::new(),
            indices: Vec::new(),
            material_index_counts: Vec::new(),
            bones: Vec::new(),
            ik_chains: Vec::new(),
            faces: Vec::new(),
            trailing: Trailing::None,
            rigid_body_bones: Vec::new(),
            constraint_count: 0,
        }
    }
}

impl PmdBuilder {
    pub fn build(&self) -> Buf {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"Pmd");
        buf.write_f32::<LittleEndian>(self.version).unwrap();
        write_name(&mut buf, &self.name, 20);
        write_name(&mut buf, b"comment", 256);

        buf.write_u32::<LittleEndian>(self.vertices.len() as u32).unwrap();
        for (i, position) in self.vertices.iter().enumerate() {
            write_vec3(&mut buf, *position);
            write_vec3(&mut buf, Vec3::Y);
            buf.write_f32::<LittleEndian>(0.0).unwrap();
            buf.write_f32::<LittleEndian>(0.0).unwrap();
            let bone = (i % self.bones.len().max(1)) as u16;
            buf.write_u16::<LittleEndian>(bone).unwrap();
            buf.write_u16::<LittleEndian>(bone).unwrap();
            buf.write_u8(100).unwrap();
            buf.write_u8(0).unwrap();
        }

        buf.write_u32::<LittleEndian>(self.indices.len() as u32).unwrap();
        for index in &self.indices {
            buf.write_u16::<LittleEndian>(*index).unwrap();
        }

        buf.write_u32::<LittleEndian>(self.material_index_counts.len() as u32).unwrap();
        for count in &self.material_index_counts {
            for v in [1.0f32, 1.0, 1.0, 1.0, 5.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5] {
                buf.write_f32::<LittleEndian>(v).unwrap();
            }
            buf.write_u8(0).unwrap();
            buf.write_u8(1).unwrap();
            buf.write_u32::<LittleEndian>(*count).unwrap();
            write_name(&mut buf, b"tex.bmp", 20);
        }

        buf.write_u16::<LittleEndian>(self.bones.len() as u16).unwrap();
        for bone in &self.bones {
            write_name(&mut buf, &bone.name, 20);
            buf.write_i16::<LittleEndian>(bone.parent).unwrap();
            buf.write_i16::<LittleEndian>(bone.child).unwrap();
            buf.write_u8(bone.kind).unwrap();
            buf.write_i16::<LittleEndian>(bone.target).unwrap();
            write_vec3(&mut buf, bone.position);
        }

        buf.write_u16::<LittleEndian>(self.ik_chains.len() as u16).unwrap();
        for chain in &self.ik_chains {
            buf.write_i16::<LittleEndian>(chain.destination).unwrap();
            buf.write_i16::<LittleEndian>(chain.target).unwrap();
            buf.write_u8(chain.links.len() as u8).unwrap();
            buf.write_u16::<LittleEndian>(chain.iterations).unwrap();
            buf.write_f32::<LittleEndian>(chain.control_weight).unwrap();
            for link in &chain.links {
                buf.write_i16::<LittleEndian>(*link).unwrap();
            }
        }

        buf.write_u16::<LittleEndian>(self.faces.len() as u16).unwrap();
        for face in &self.faces {
            write_name(&mut buf, &face.name, 20);
            buf.write_u32::<LittleEndian>(face.vertices.len() as u32).unwrap();
            buf.write_u8(face.kind).unwrap();
            for (index, offset) in &face.vertices {
                buf.write_u32::<LittleEndian>(*index).unwrap();
                write_vec3(&mut buf, *offset);
            }
        }

        if self.trailing >= Trailing::DisplayLists {
            // 表情显示列表：除 Base 外的全部表情
            let shown: Vec<u16> = (1..self.faces.len() as u16).collect();
            buf.write_u8(shown.len() as u8).unwrap();
            for index in shown {
                buf.write_u16::<LittleEndian>(index).unwrap();
            }
            buf.write_u8(1).unwrap();
            write_name(&mut buf, b"group", 50);
            buf.write_u32::<LittleEndian>(self.bones.len() as u32).unwrap();
            for i in 0..self.bones.len() {
                buf.write_u16::<LittleEndian>(i as u16).unwrap();
                buf.write_u8(1).unwrap();
            }
        }

        if self.trailing >= Trailing::EnglishNames {
            buf.write_u8(1).unwrap();
            write_name(&mut buf, b"english model", 20);
            write_name(&mut buf, b"english comment", 256);
            for i in 0..self.bones.len() {
                write_name(&mut buf, format!("bone{i}").as_bytes(), 20);
            }
            for i in 1..self.faces.len() {
                write_name(&mut buf, format!("face{i}").as_bytes(), 20);
            }
            write_name(&mut buf, b"Group", 50);
        }

        if self.trailing >= Trailing::ToonTextures {
            for i in 1..=10 {
                write_name(&mut buf, format!("toon{i:02}.bmp").as_bytes(), 100);
            }
        }

        if self.trailing >= Trailing::Physics {
            buf.write_u32::<LittleEndian>(self.rigid_body_bones.len() as u32).unwrap();
            for bone in &self.rigid_body_bones {
                write_name(&mut buf, b"body", 20);
                buf.write_i16::<LittleEndian>(*bone).unwrap();
                buf.write_u8(0).unwrap(); // group
                buf.write_u16::<LittleEndian>(0xffff).unwrap(); // mask
                buf.write_u8(0).unwrap(); // sphere
                write_vec3(&mut buf, Vec3::splat(0.5));
                write_vec3(&mut buf, Vec3::ZERO);
                write_vec3(&mut buf, Vec3::ZERO);
                for v in [1.0f32, 0.5, 0.5, 0.0, 0.5] {
                    buf.write_f32::<LittleEndian>(v).unwrap();
                }
                buf.write_u8(1).unwrap(); // dynamic
            }
            buf.write_u32::<LittleEndian>(self.constraint_count).unwrap();
            for _ in 0..self.constraint_count {
                write_name(&mut buf, b"joint", 20);
                buf.write_u32::<LittleEndian>(0).unwrap();
                buf.write_u32::<LittleEndian>(0).unwrap();
                for _ in 0..6 {
                    write_vec3(&mut buf, Vec3::ZERO);
                }
                write_vec3(&mut buf, Vec3::ZERO);
                write_vec3(&mut buf, Vec3::ZERO);
            }
        }

        buf
    }
}

/// 一个三骨骼的腿部模型：センター、膝、足首，外加 IK 目标骨骼
pub fn leg_model() -> PmdBuilder {
    PmdBuilder {
        vertices: vec![Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 2.0, 0.0)],
        indices: vec![0, 1, 2],
        material_index_counts: vec![3],
        bones: vec![
            BoneSpec::new(b"hip", -1, Vec3::new(0.0, 2.0, 0.0)),
            BoneSpec {
                kind: 0,
                ..BoneSpec::new(b"knee", 0, Vec3::new(0.0, 1.0, 0.0))
            },
            BoneSpec {
                kind: 0,
                ..BoneSpec::new(b"ankle", 1, Vec3::new(0.0, 0.0, 0.0))
            },
            BoneSpec {
                kind: 2,
                ..BoneSpec::new(b"leg IK", -1, Vec3::new(0.0, 0.0, 0.0))
            },
        ],
        ik_chains: vec![IkSpec {
            destination: 3,
            target: 2,
            iterations: 40,
            control_weight: 0.5,
            links: vec![1, 0],
        }],
        faces: vec![
            FaceSpec {
                name: b"base".to_vec(),
                kind: 0,
                vertices: vec![(0, Vec3::ZERO), (2, Vec3::new(0.0, 2.0, 0.0))],
            },
            FaceSpec {
                name: b"smile".to_vec(),
                kind: 3,
                vertices: vec![(1, Vec3::new(0.5, 0.0, 0.0))],
            },
        ],
        ..PmdBuilder::default()
    }
}

/// 骨骼关键帧参数
#[derive(Clone, Debug)]
pub struct BoneKey {
    pub name: Vec<u8>,
    pub frame: u32,
    pub position: Vec3,
    pub rotation: Quat,
    pub interpolation: [u8; 64],
}

impl BoneKey {
    pub fn linear(name: &[u8], frame: u32, position: Vec3) -> Self {
        Self {
            name: name.to_vec(),
            frame,
            position,
            rotation: Quat::IDENTITY,
            interpolation: mmd_engine::animation::linear_bone_table(),
        }
    }
}

/// VMD 缓冲区生成器
///
/// 相机、照明、本影区域为 `None` 时不写出（连同之后的区域）。
#[derive(Clone, Debug, Default)]
pub struct VmdBuilder {
    pub name: Vec<u8>,
    pub bones: Vec<BoneKey>,
    pub morphs: Vec<(Vec<u8>, u32, f32)>,
    pub cameras: Option<Vec<(u32, f32, Vec3, Vec3, u32)>>,
    pub lights: Option<Vec<(u32, Vec3, Vec3)>>,
    pub self_shadows: Option<Vec<(u32, u8, f32)>>,
}

impl VmdBuilder {
    pub fn build(&self) -> Buf {
        let mut buf = Vec::new();
        write_name(&mut buf, b"Vocaloid Motion Data 0002", 30);
        write_name(&mut buf, &self.name, 20);

        buf.write_u32::<LittleEndian>(self.bones.len() as u32).unwrap();
        for key in &self.bones {
            write_name(&mut buf, &key.name, 15);
            buf.write_u32::<LittleEndian>(key.frame).unwrap();
            write_vec3(&mut buf, key.position);
            for v in [key.rotation.x, key.rotation.y, key.rotation.z, key.rotation.w] {
                buf.write_f32::<LittleEndian>(v).unwrap();
            }
            buf.extend_from_slice(&key.interpolation);
        }

        buf.write_u32::<LittleEndian>(self.morphs.len() as u32).unwrap();
        for (name, frame, weight) in &self.morphs {
            write_name(&mut buf, name, 15);
            buf.write_u32::<LittleEndian>(*frame).unwrap();
            buf.write_f32::<LittleEndian>(*weight).unwrap();
        }

        let Some(cameras) = &self.cameras else {
            return buf;
        };
        buf.write_u32::<LittleEndian>(cameras.len() as u32).unwrap();
        for (frame, distance, position, angle, fov) in cameras {
            buf.write_u32::<LittleEndian>(*frame).unwrap();
            buf.write_f32::<LittleEndian>(*distance).unwrap();
            write_vec3(&mut buf, *position);
            write_vec3(&mut buf, *angle);
            for _ in 0..6 {
                buf.extend_from_slice(&[20, 107, 20, 107]);
            }
            buf.write_u32::<LittleEndian>(*fov).unwrap();
            buf.write_u8(0).unwrap();
        }

        let Some(lights) = &self.lights else {
            return buf;
        };
        buf.write_u32::<LittleEndian>(lights.len() as u32).unwrap();
        for (frame, color, direction) in lights {
            buf.write_u32::<LittleEndian>(*frame).unwrap();
            write_vec3(&mut buf, *color);
            write_vec3(&mut buf, *direction);
        }

        let Some(self_shadows) = &self.self_shadows else {
            return buf;
        };
        buf.write_u32::<LittleEndian>(self_shadows.len() as u32).unwrap();
        for (frame, mode, distance) in self_shadows {
            buf.write_u32::<LittleEndian>(*frame).unwrap();
            buf.write_u8(*mode).unwrap();
            buf.write_f32::<LittleEndian>(*distance).unwrap();
        }
        buf
    }
}
