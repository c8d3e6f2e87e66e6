//! PMD 模型加载器
//!
//! 两阶段：[`ModelLayout::validate`] 检查所有区域边界，
//! [`build_model`] 在校验后的布局上无错误地构建实体。

use std::path::Path;

use glam::Vec3;

use crate::binary::{FieldReader, FixedString};
use crate::config::EngineConfig;
use crate::morph::{Morph, MorphManager, MorphName, FACE_HEADER_SIZE, FACE_VERTEX_STRIDE};
use crate::physics::{JointDesc, RigidBodyDesc, CONSTRAINT_STRIDE, RIGID_BODY_STRIDE};
use crate::skeleton::{Bone, BoneManager, BoneName, IkSolver, RawBone, RawIkChain, BONE_STRIDE};
use crate::{MmdError, Result};

use super::layout::{
    BONE_CATEGORY_NAME_SIZE, BONE_DISPLAY_STRIDE, CUSTOM_TEXTURE_NAME_SIZE, FACE_DISPLAY_STRIDE,
    INDEX_STRIDE, MATERIAL_STRIDE, NAME_SIZE, VERTEX_STRIDE,
};
use super::{
    read_vertex, BoneDisplay, CategoryName, ModelError, ModelLayout, PmdMaterial, PmdModel,
    TextureName,
};

/// 先校验再构建；校验失败时 `build` 不会被调用
pub fn load_with<'a, T>(
    bytes: &'a [u8],
    build: impl FnOnce(&ModelLayout<'a>) -> T,
) -> std::result::Result<T, ModelError> {
    let layout = ModelLayout::validate(bytes)?;
    Ok(build(&layout))
}

/// 从内存加载 PMD 模型
pub fn load_pmd(bytes: &[u8], config: &EngineConfig) -> std::result::Result<PmdModel, ModelError> {
    load_with(bytes, |layout| build_model(layout, config))
}

/// 从文件加载 PMD 模型
pub fn load_pmd_file<P: AsRef<Path>>(path: P, config: &EngineConfig) -> Result<PmdModel> {
    let bytes = std::fs::read(path.as_ref()).map_err(MmdError::Io)?;
    Ok(load_pmd(&bytes, config)?)
}

/// 在校验后的布局上构建模型
pub fn build_model(layout: &ModelLayout<'_>, config: &EngineConfig) -> PmdModel {
    let handedness = config.handedness();

    // 读取顶点
    let (vertices, weights): (Vec<_>, Vec<_>) = layout
        .vertices
        .records(VERTEX_STRIDE)
        .map(|record| read_vertex(record, handedness))
        .unzip();

    // 读取面
    let mut indices: Vec<u32> = layout
        .indices
        .records(INDEX_STRIDE)
        .map(|record| FieldReader::new(record).u16() as u32)
        .collect();
    if config.flip_handedness {
        // 翻转Z轴后需要反转三角形顺序以保持正确的面朝向
        for triangle in indices.chunks_exact_mut(3) {
            triangle.swap(0, 2);
        }
    }

    // 读取材质
    let mut begin_index = 0u32;
    let materials: Vec<PmdMaterial> = layout
        .materials
        .records(MATERIAL_STRIDE)
        .map(|record| {
            let material = PmdMaterial::read(record, begin_index);
            begin_index = begin_index.saturating_add(material.index_count);
            material
        })
        .collect();

    // 读取骨骼
    let bone_count = layout.bones.count;
    let mut bone_manager = BoneManager::new();
    for (i, record) in layout.bones.records(BONE_STRIDE).enumerate() {
        let raw = RawBone::read(record, handedness);
        bone_manager.add_bone(Bone::from_raw(i, &raw, bone_count));
    }
    if let Some(english) = &layout.english {
        for (i, record) in english.bone_names.records(NAME_SIZE).enumerate() {
            if let Some(bone) = bone_manager.get_bone_mut(i) {
                bone.english_name = Some(BoneName::from_bytes(record));
            }
        }
    }
    bone_manager.build_hierarchy(&config.reserved_names);

    // 读取 IK
    let hinge_direction = if config.flip_handedness { 1.0 } else { -1.0 };
    let mut offset = 0;
    for _ in 0..layout.ik_chains.count {
        let (raw, consumed) = RawIkChain::read(&layout.ik_chains.bytes[offset..]);
        offset += consumed;
        let solver = IkSolver::from_raw(&raw, bone_manager.bones(), |name| {
            config.reserved_names.is_axis_locked(name)
        });
        match solver {
            Some(mut solver) => {
                solver.hinge_direction = hinge_direction;
                bone_manager.add_ik_solver(solver);
            }
            None => log::warn!(
                "Discarding IK chain: destination {} or target {} does not resolve",
                raw.destination,
                raw.target
            ),
        }
    }

    // 读取表情
    let mut morph_manager = MorphManager::new();
    let mut offset = 0;
    for _ in 0..layout.faces.count {
        let (morph, consumed) = Morph::read(&layout.faces.bytes[offset..], handedness);
        debug_assert!(consumed >= FACE_HEADER_SIZE);
        debug_assert_eq!((consumed - FACE_HEADER_SIZE) % FACE_VERTEX_STRIDE, 0);
        offset += consumed;
        morph_manager.add_morph(morph);
    }
    morph_manager.rebase_indices();
    if let Some(english) = &layout.english {
        let mut names = english.face_names.records(NAME_SIZE);
        for index in 0..morph_manager.morph_count() {
            let Some(morph) = morph_manager.get_morph_mut(index) else {
                break;
            };
            if morph.is_base() {
                continue;
            }
            match names.next() {
                Some(record) => morph.english_name = Some(MorphName::from_bytes(record)),
                None => break,
            }
        }
    }

    // 显示分组
    let face_display = layout
        .face_display_names
        .records(FACE_DISPLAY_STRIDE)
        .map(|record| FieldReader::new(record).u16())
        .collect();
    let bone_category_names = layout
        .bone_category_names
        .records(BONE_CATEGORY_NAME_SIZE)
        .map(CategoryName::from_bytes)
        .collect();
    let bone_display = layout
        .bone_display_names
        .records(BONE_DISPLAY_STRIDE)
        .map(|record| {
            let mut reader = FieldReader::new(record);
            BoneDisplay {
                bone_index: reader.u16(),
                category: reader.u8(),
            }
        })
        .collect();

    let custom_textures = layout.custom_textures.map(|region| {
        region
            .records(CUSTOM_TEXTURE_NAME_SIZE)
            .map(TextureName::from_bytes)
            .collect()
    });

    // 读取刚体和关节
    let rigid_bodies: Vec<RigidBodyDesc> = layout
        .rigid_bodies
        .records(RIGID_BODY_STRIDE)
        .map(|record| RigidBodyDesc::read(record, handedness, bone_count))
        .collect();
    let joints: Vec<JointDesc> = layout
        .constraints
        .records(CONSTRAINT_STRIDE)
        .map(|record| JointDesc::read(record, handedness))
        .collect();

    // 初始化更新缓冲区
    let update_positions: Vec<Vec3> = vertices.iter().map(|v| v.position).collect();

    let mut model = PmdModel::new();
    model.name = FixedString::from_bytes(layout.name);
    model.comment = FixedString::from_bytes(layout.comment);
    if let Some(english) = &layout.english {
        model.english_name = Some(FixedString::from_bytes(english.name));
        model.english_comment = Some(FixedString::from_bytes(english.comment));
        model.english_bone_category_names = english
            .bone_category_names
            .records(BONE_CATEGORY_NAME_SIZE)
            .map(CategoryName::from_bytes)
            .collect();
    }
    model.vertices = vertices;
    model.weights = weights;
    model.indices = indices;
    model.materials = materials;
    model.face_display = face_display;
    model.bone_category_names = bone_category_names;
    model.bone_display = bone_display;
    model.custom_textures = custom_textures;
    model.rigid_bodies = rigid_bodies;
    model.joints = joints;
    model.update_positions = update_positions;
    model.bone_manager = bone_manager;
    model.morph_manager = morph_manager;

    log::info!(
        "PMD model {} built: {} vertices, {} materials, {} bones, {} IK chains, {} faces, {} rigid bodies, {} joints",
        model.name,
        model.vertex_count(),
        model.material_count(),
        model.bone_count(),
        model.bone_manager.ik_solvers().len(),
        model.morph_count(),
        model.rigid_bodies.len(),
        model.joints.len(),
    );

    model
}
