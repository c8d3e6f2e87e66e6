//! PMD 缓冲区布局校验
//!
//! 逐区域读取数量字段并检查剩余长度，只记录每个区域在原缓冲区中的位置。
//! 校验成功后构建阶段可以无错误地按固定偏移解码。

use thiserror::Error;

use crate::binary::{ByteReader, Region};
use crate::morph::{FACE_HEADER_SIZE, FACE_VERTEX_STRIDE};
use crate::physics::{CONSTRAINT_STRIDE, RIGID_BODY_STRIDE};
use crate::skeleton::{BONE_STRIDE, IK_HEADER_SIZE, IK_LINK_STRIDE};

pub const PMD_SIGNATURE: &[u8; 3] = b"Pmd";
pub const PMD_VERSION: f32 = 1.0;
pub const NAME_SIZE: usize = 20;
pub const COMMENT_SIZE: usize = 256;
/// 签名 3 + 版本 4 + 名称 20 + 注释 256
pub const HEADER_SIZE: usize = 3 + 4 + NAME_SIZE + COMMENT_SIZE;

pub const VERTEX_STRIDE: usize = 38;
pub const INDEX_STRIDE: usize = 2;
pub const MATERIAL_STRIDE: usize = 70;
pub const FACE_DISPLAY_STRIDE: usize = 2;
pub const BONE_CATEGORY_NAME_SIZE: usize = 50;
pub const BONE_DISPLAY_STRIDE: usize = 3;
pub const CUSTOM_TEXTURE_NAME_SIZE: usize = 100;
pub const CUSTOM_TEXTURE_COUNT: usize = 10;

/// PMD 解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("buffer is shorter than the PMD header")]
    InvalidHeader,
    #[error("PMD signature mismatch")]
    InvalidSignature,
    #[error("unsupported PMD version {0}")]
    InvalidVersion(f32),

    #[error("vertex count is missing")]
    VerticesSize,
    #[error("vertex records overrun the buffer")]
    VerticesData,
    #[error("index count is missing")]
    IndicesSize,
    #[error("index records overrun the buffer")]
    IndicesData,
    #[error("material count is missing")]
    MaterialsSize,
    #[error("material records overrun the buffer")]
    MaterialsData,
    #[error("bone count is missing")]
    BonesSize,
    #[error("bone records overrun the buffer")]
    BonesData,
    #[error("IK chain count is missing")]
    IkChainsSize,
    #[error("IK chain records overrun the buffer")]
    IkChainsData,
    #[error("face count is missing")]
    FacesSize,
    #[error("face records overrun the buffer")]
    FacesData,
    #[error("face display count is missing")]
    FaceDisplayNamesSize,
    #[error("face display records overrun the buffer")]
    FaceDisplayNamesData,
    #[error("bone category count is missing")]
    BoneCategoryNamesSize,
    #[error("bone category names overrun the buffer")]
    BoneCategoryNamesData,
    #[error("bone display count is missing")]
    BoneDisplayNamesSize,
    #[error("bone display records overrun the buffer")]
    BoneDisplayNamesData,
    #[error("English name flag is missing")]
    EnglishNamesSize,
    #[error("English names overrun the buffer")]
    EnglishNamesData,
    #[error("custom toon texture table is truncated")]
    CustomTextureNamesSize,
    #[error("rigid body count is missing")]
    RigidBodiesSize,
    #[error("rigid body records overrun the buffer")]
    RigidBodiesData,
    #[error("constraint count is missing")]
    ConstraintsSize,
    #[error("constraint records overrun the buffer")]
    ConstraintsData,
}

/// 英文名称区域
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnglishLayout<'a> {
    pub name: &'a [u8],
    pub comment: &'a [u8],
    /// 每根骨骼一个名称
    pub bone_names: Region<'a>,
    /// 除 Base 外每个表情一个名称
    pub face_names: Region<'a>,
    pub bone_category_names: Region<'a>,
}

/// 校验后的 PMD 布局（原缓冲区上的视图）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelLayout<'a> {
    pub version: f32,
    pub name: &'a [u8],
    pub comment: &'a [u8],
    pub vertices: Region<'a>,
    pub indices: Region<'a>,
    pub materials: Region<'a>,
    pub bones: Region<'a>,
    pub ik_chains: Region<'a>,
    pub faces: Region<'a>,
    pub face_display_names: Region<'a>,
    pub bone_category_names: Region<'a>,
    pub bone_display_names: Region<'a>,
    pub english: Option<EnglishLayout<'a>>,
    pub custom_textures: Option<Region<'a>>,
    pub rigid_bodies: Region<'a>,
    pub constraints: Region<'a>,
}

impl<'a> ModelLayout<'a> {
    /// 校验缓冲区，返回遇到的第一个错误
    pub fn validate(bytes: &'a [u8]) -> Result<Self, ModelError> {
        let mut reader = ByteReader::new(bytes);
        let header = reader.take(HEADER_SIZE).ok_or(ModelError::InvalidHeader)?;
        if &header[..3] != PMD_SIGNATURE {
            return Err(ModelError::InvalidSignature);
        }
        let version = f32::from_le_bytes([header[3], header[4], header[5], header[6]]);
        if version != PMD_VERSION {
            return Err(ModelError::InvalidVersion(version));
        }

        let mut layout = ModelLayout {
            version,
            name: &header[7..7 + NAME_SIZE],
            comment: &header[7 + NAME_SIZE..],
            ..Default::default()
        };

        layout.vertices = fixed_region(
            &mut reader,
            CountWidth::U32,
            VERTEX_STRIDE,
            ModelError::VerticesSize,
            ModelError::VerticesData,
        )?;
        layout.indices = fixed_region(
            &mut reader,
            CountWidth::U32,
            INDEX_STRIDE,
            ModelError::IndicesSize,
            ModelError::IndicesData,
        )?;
        layout.materials = fixed_region(
            &mut reader,
            CountWidth::U32,
            MATERIAL_STRIDE,
            ModelError::MaterialsSize,
            ModelError::MaterialsData,
        )?;
        layout.bones = fixed_region(
            &mut reader,
            CountWidth::U16,
            BONE_STRIDE,
            ModelError::BonesSize,
            ModelError::BonesData,
        )?;
        layout.ik_chains = variable_region(
            &mut reader,
            IK_HEADER_SIZE,
            |header| header[4] as usize * IK_LINK_STRIDE,
            ModelError::IkChainsSize,
            ModelError::IkChainsData,
        )?;
        layout.faces = variable_region(
            &mut reader,
            FACE_HEADER_SIZE,
            |header| {
                let count = u32::from_le_bytes([header[20], header[21], header[22], header[23]]);
                (count as usize).saturating_mul(FACE_VERTEX_STRIDE)
            },
            ModelError::FacesSize,
            ModelError::FacesData,
        )?;

        // 以下区域可以整体缺失：在区域边界处剩余字节为 0 即正常结束
        if reader.is_empty() {
            return Ok(layout);
        }
        layout.face_display_names = fixed_region(
            &mut reader,
            CountWidth::U8,
            FACE_DISPLAY_STRIDE,
            ModelError::FaceDisplayNamesSize,
            ModelError::FaceDisplayNamesData,
        )?;
        if reader.is_empty() {
            return Ok(layout);
        }
        layout.bone_category_names = fixed_region(
            &mut reader,
            CountWidth::U8,
            BONE_CATEGORY_NAME_SIZE,
            ModelError::BoneCategoryNamesSize,
            ModelError::BoneCategoryNamesData,
        )?;
        if reader.is_empty() {
            return Ok(layout);
        }
        layout.bone_display_names = fixed_region(
            &mut reader,
            CountWidth::U32,
            BONE_DISPLAY_STRIDE,
            ModelError::BoneDisplayNamesSize,
            ModelError::BoneDisplayNamesData,
        )?;
        if reader.is_empty() {
            return Ok(layout);
        }

        let has_english = reader.read_u8().ok_or(ModelError::EnglishNamesSize)?;
        if has_english != 0 {
            layout.english = Some(english_region(&mut reader, &layout)?);
        }
        if reader.is_empty() {
            return Ok(layout);
        }

        let textures = reader
            .take_records(CUSTOM_TEXTURE_COUNT, CUSTOM_TEXTURE_NAME_SIZE)
            .ok_or(ModelError::CustomTextureNamesSize)?;
        layout.custom_textures = Some(Region::new(textures, CUSTOM_TEXTURE_COUNT));
        if reader.is_empty() {
            return Ok(layout);
        }

        layout.rigid_bodies = fixed_region(
            &mut reader,
            CountWidth::U32,
            RIGID_BODY_STRIDE,
            ModelError::RigidBodiesSize,
            ModelError::RigidBodiesData,
        )?;
        if reader.is_empty() {
            return Ok(layout);
        }
        layout.constraints = fixed_region(
            &mut reader,
            CountWidth::U32,
            CONSTRAINT_STRIDE,
            ModelError::ConstraintsSize,
            ModelError::ConstraintsData,
        )?;

        Ok(layout)
    }
}

#[derive(Clone, Copy)]
enum CountWidth {
    U8,
    U16,
    U32,
}

fn read_count(reader: &mut ByteReader<'_>, width: CountWidth) -> Option<usize> {
    match width {
        CountWidth::U8 => reader.read_u8().map(usize::from),
        CountWidth::U16 => reader.read_u16().map(usize::from),
        CountWidth::U32 => reader.read_u32().map(|c| c as usize),
    }
}

/// 数量字段 + `count * stride` 字节
fn fixed_region<'a>(
    reader: &mut ByteReader<'a>,
    width: CountWidth,
    stride: usize,
    size_error: ModelError,
    data_error: ModelError,
) -> Result<Region<'a>, ModelError> {
    let count = read_count(reader, width).ok_or(size_error)?;
    let bytes = reader.take_records(count, stride).ok_or(data_error)?;
    Ok(Region::new(bytes, count))
}

/// u16 数量字段 + 变长记录（头部中记录了子列表长度）
fn variable_region<'a>(
    reader: &mut ByteReader<'a>,
    header_size: usize,
    tail_size: impl Fn(&[u8]) -> usize,
    size_error: ModelError,
    data_error: ModelError,
) -> Result<Region<'a>, ModelError> {
    let count = read_count(reader, CountWidth::U16).ok_or(size_error)?;
    let start = reader.offset();
    let mut len = 0usize;
    let mut probe = reader.clone();
    for _ in 0..count {
        let header = probe.take(header_size).ok_or_else(|| data_error.clone())?;
        let tail = tail_size(header);
        probe.take(tail).ok_or_else(|| data_error.clone())?;
        len += header_size + tail;
    }
    let bytes = reader.take(len).ok_or(data_error)?;
    debug_assert_eq!(reader.offset(), start + len);
    Ok(Region::new(bytes, count))
}

fn english_region<'a>(
    reader: &mut ByteReader<'a>,
    layout: &ModelLayout<'a>,
) -> Result<EnglishLayout<'a>, ModelError> {
    let name = reader.take(NAME_SIZE).ok_or(ModelError::EnglishNamesData)?;
    let comment = reader.take(COMMENT_SIZE).ok_or(ModelError::EnglishNamesData)?;

    let bone_count = layout.bones.count;
    let face_count = layout.faces.count.saturating_sub(1);
    let category_count = layout.bone_category_names.count;

    let bone_names = reader
        .take_records(bone_count, NAME_SIZE)
        .ok_or(ModelError::EnglishNamesData)?;
    let face_names = reader
        .take_records(face_count, NAME_SIZE)
        .ok_or(ModelError::EnglishNamesData)?;
    let category_names = reader
        .take_records(category_count, BONE_CATEGORY_NAME_SIZE)
        .ok_or(ModelError::EnglishNamesData)?;

    Ok(EnglishLayout {
        name,
        comment,
        bone_names: Region::new(bone_names, bone_count),
        face_names: Region::new(face_names, face_count),
        bone_category_names: Region::new(category_names, category_count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<u8> {
        let mut buf = b"Pmd".to_vec();
        buf.extend_from_slice(&1.0f32.to_le_bytes());
        buf.resize(HEADER_SIZE, 0);
        buf
    }

    /// 各区域数量均为 0 的最小模型
    fn minimal() -> Vec<u8> {
        let mut buf = header();
        buf.extend_from_slice(&0u32.to_le_bytes()); // vertices
        buf.extend_from_slice(&0u32.to_le_bytes()); // indices
        buf.extend_from_slice(&0u32.to_le_bytes()); // materials
        buf.extend_from_slice(&0u16.to_le_bytes()); // bones
        buf.extend_from_slice(&0u16.to_le_bytes()); // ik
        buf.extend_from_slice(&0u16.to_le_bytes()); // faces
        buf
    }

    #[test]
    fn test_header_errors() {
        assert_eq!(ModelLayout::validate(&[]), Err(ModelError::InvalidHeader));
        assert_eq!(ModelLayout::validate(&[0u8; 100]), Err(ModelError::InvalidHeader));

        let mut buf = header();
        buf[0] = b'X';
        assert_eq!(ModelLayout::validate(&buf), Err(ModelError::InvalidSignature));

        let mut buf = header();
        buf[3..7].copy_from_slice(&2.0f32.to_le_bytes());
        assert_eq!(ModelLayout::validate(&buf), Err(ModelError::InvalidVersion(2.0)));
    }

    #[test]
    fn test_minimal_ends_after_faces() {
        let buf = minimal();
        let layout = ModelLayout::validate(&buf).unwrap();
        assert_eq!(layout.version, 1.0);
        assert_eq!(layout.bones.count, 0);
        assert!(layout.english.is_none());
        assert!(layout.custom_textures.is_none());
    }

    #[test]
    fn test_missing_count_reports_region() {
        let buf = header();
        assert_eq!(ModelLayout::validate(&buf), Err(ModelError::VerticesSize));

        let mut buf = header();
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; VERTEX_STRIDE - 1]);
        assert_eq!(ModelLayout::validate(&buf), Err(ModelError::VerticesData));
    }

    #[test]
    fn test_ik_chain_link_overrun() {
        let mut buf = minimal();
        buf.truncate(buf.len() - 4);
        buf.extend_from_slice(&1u16.to_le_bytes());
        // 头部声明 3 个链接，但只提供 1 个
        let mut chain = vec![0u8; IK_HEADER_SIZE];
        chain[4] = 3;
        buf.extend_from_slice(&chain);
        buf.extend_from_slice(&0i16.to_le_bytes());
        assert_eq!(ModelLayout::validate(&buf), Err(ModelError::IkChainsData));
    }

    #[test]
    fn test_huge_face_count_is_data_error() {
        let mut buf = minimal();
        buf.truncate(buf.len() - 2);
        buf.extend_from_slice(&1u16.to_le_bytes());
        let mut face = vec![0u8; FACE_HEADER_SIZE];
        face[20..24].copy_from_slice(&u32::MAX.to_le_bytes());
        buf.extend_from_slice(&face);
        assert_eq!(ModelLayout::validate(&buf), Err(ModelError::FacesData));
    }

    #[test]
    fn test_truncated_toon_table() {
        let mut buf = minimal();
        buf.push(0); // face display
        buf.push(0); // bone categories
        buf.extend_from_slice(&0u32.to_le_bytes()); // bone display
        buf.push(0); // no English
        buf.extend_from_slice(&[0u8; 10]);
        assert_eq!(ModelLayout::validate(&buf), Err(ModelError::CustomTextureNamesSize));
    }
}
