//! Morph 定义

use super::{MorphName, MorphType, VertexMorphOffset};
use crate::binary::FieldReader;
use crate::config::Handedness;

/// 表情记录头部：名称 20 + 顶点数 4 + 类型 1
pub const FACE_HEADER_SIZE: usize = 25;
/// 顶点偏移：顶点索引 4 + 位置 12
pub const FACE_VERTEX_STRIDE: usize = 16;

/// Morph 变形
#[derive(Clone, Debug)]
pub struct Morph {
    pub name: MorphName,
    pub english_name: Option<MorphName>,
    pub morph_type: MorphType,
    /// 动画设置的权重，通常在 [0, 1]，不做硬性限制
    pub weight: f32,

    /// Base 类型为绝对位置，其余类型为位移
    pub vertex_offsets: Vec<VertexMorphOffset>,
}

impl Morph {
    pub fn new(name: MorphName, morph_type: MorphType) -> Self {
        Self {
            name,
            english_name: None,
            morph_type,
            weight: 0.0,
            vertex_offsets: Vec::new(),
        }
    }

    /// 读取一条变长表情记录，返回记录和消耗的字节数
    pub(crate) fn read(bytes: &[u8], handedness: Handedness) -> (Self, usize) {
        let mut reader = FieldReader::new(bytes);
        let name = MorphName::from_raw(reader.bytes());
        let vertex_count = reader.u32() as usize;
        let morph_type = MorphType::from_raw(reader.u8());

        let mut morph = Self::new(name, morph_type);
        morph.vertex_offsets = (0..vertex_count)
            .map(|_| VertexMorphOffset {
                vertex_index: reader.u32(),
                offset: handedness.position(reader.vec3()),
            })
            .collect();
        (morph, reader.offset())
    }

    pub fn is_base(&self) -> bool {
        self.morph_type == MorphType::Base
    }

    /// 获取权重
    pub fn get_weight(&self) -> f32 {
        self.weight
    }

    /// 设置权重
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    /// 重置权重
    pub fn reset(&mut self) {
        self.weight = 0.0;
    }
}

impl Default for Morph {
    fn default() -> Self {
        Self::new(MorphName::default(), MorphType::Other)
    }
}
