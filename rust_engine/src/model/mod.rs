//! PMD 模型：布局校验、构建与运行时

mod layout;
mod loader;
mod material;
mod runtime;

pub use layout::{EnglishLayout, ModelError, ModelLayout};
pub use loader::{build_model, load_pmd, load_pmd_file, load_with};
pub use material::PmdMaterial;
pub use runtime::PmdModel;

use glam::{Vec2, Vec3};

use crate::binary::{FieldReader, FixedString};
use crate::config::Handedness;

/// 骨骼分组名称（50 字节）
pub type CategoryName = FixedString<50>;
/// toon 纹理文件名（100 字节）
pub type TextureName = FixedString<100>;

/// 运行时顶点数据
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    /// 不绘制轮廓线
    pub edge_disabled: bool,
}

/// 模型顶点骨骼权重（两骨骼线性混合）
#[derive(Clone, Debug, PartialEq)]
pub struct VertexWeight {
    pub bones: [u16; 2],
    /// 第一根骨骼的权重 [0, 1]
    pub weight: f32,
}

impl Default for VertexWeight {
    fn default() -> Self {
        Self {
            bones: [0, 0],
            weight: 1.0,
        }
    }
}

pub(crate) fn read_vertex(record: &[u8], handedness: Handedness) -> (RuntimeVertex, VertexWeight) {
    let mut reader = FieldReader::new(record);
    let position = handedness.position(reader.vec3());
    let normal = handedness.position(reader.vec3());
    let uv = reader.vec2();
    let bones = [reader.u16(), reader.u16()];
    let weight = reader.u8() as f32 / 100.0;
    let edge_disabled = reader.u8() != 0;
    (
        RuntimeVertex {
            position,
            normal,
            uv,
            edge_disabled,
        },
        VertexWeight { bones, weight },
    )
}

/// 骨骼在显示分组中的归属
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoneDisplay {
    pub bone_index: u16,
    /// 分组编号（从 1 开始，对应 bone_category_names 的下标 + 1）
    pub category: u8,
}
