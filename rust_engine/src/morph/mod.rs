//! Morph 变形系统（PMD 表情）

mod manager;
mod morph;

pub use manager::MorphManager;
pub use morph::Morph;
pub(crate) use morph::{FACE_HEADER_SIZE, FACE_VERTEX_STRIDE};

use glam::Vec3;

use crate::binary::FixedString;

/// 表情名称（20 字节）
pub type MorphName = FixedString<20>;

/// Morph 类型（PMD 表情分类）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MorphType {
    /// 基础表情：保存受影响顶点的绝对位置
    Base,
    Eyebrow,
    Eye,
    Lip,
    Other,
}

impl MorphType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => MorphType::Base,
            1 => MorphType::Eyebrow,
            2 => MorphType::Eye,
            3 => MorphType::Lip,
            _ => MorphType::Other,
        }
    }
}

/// 顶点 Morph 偏移
#[derive(Clone, Debug, PartialEq)]
pub struct VertexMorphOffset {
    pub vertex_index: u32,
    pub offset: Vec3,
}
