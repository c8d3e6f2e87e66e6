//! PMD 材质定义

use glam::{Vec3, Vec4};

use crate::binary::{FieldReader, FixedString};

/// PMD 材质
#[derive(Clone, Debug)]
pub struct PmdMaterial {
    /// RGB + alpha
    pub diffuse: Vec4,
    pub shininess: f32,
    pub specular: Vec3,
    pub ambient: Vec3,
    /// 共享 toon 纹理编号（0xFF 表示不使用）
    pub toon_index: Option<u8>,
    pub edge: bool,
    /// 该材质覆盖的索引在索引缓冲区中的起点
    pub begin_index: u32,
    pub index_count: u32,
    /// 纹理文件名，可能带有 `*` 分隔的球面贴图名
    pub texture: FixedString<20>,
}

impl PmdMaterial {
    pub(crate) fn read(record: &[u8], begin_index: u32) -> Self {
        let mut reader = FieldReader::new(record);
        let diffuse = reader.vec3();
        let alpha = reader.f32();
        let shininess = reader.f32();
        let specular = reader.vec3();
        let ambient = reader.vec3();
        let toon = reader.u8();
        let edge = reader.u8() != 0;
        let index_count = reader.u32();
        Self {
            diffuse: diffuse.extend(alpha),
            shininess,
            specular,
            ambient,
            toon_index: (toon != 0xff).then_some(toon),
            edge,
            begin_index,
            index_count,
            texture: FixedString::from_raw(reader.bytes()),
        }
    }

    /// 主纹理名和球面贴图名
    pub fn texture_names(&self) -> (&[u8], Option<&[u8]>) {
        let bytes = self.texture.as_bytes();
        match bytes.iter().position(|&b| b == b'*') {
            Some(split) => (&bytes[..split], Some(&bytes[split + 1..])),
            None => (bytes, None),
        }
    }

    /// 是否半透明
    pub fn is_translucent(&self) -> bool {
        self.diffuse.w < 1.0
    }
}

impl Default for PmdMaterial {
    fn default() -> Self {
        Self {
            diffuse: Vec4::new(1.0, 1.0, 1.0, 1.0),
            shininess: 0.0,
            specular: Vec3::ZERO,
            ambient: Vec3::new(0.5, 0.5, 0.5),
            toon_index: None,
            edge: false,
            begin_index: 0,
            index_count: 0,
            texture: FixedString::default(),
        }
    }
}
