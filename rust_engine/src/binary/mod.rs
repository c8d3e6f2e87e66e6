//! 二进制缓冲区读写工具
//!
//! - [`ByteReader`]：校验阶段使用的带边界检查的游标，越界返回 `None`
//! - [`FieldReader`]：构建阶段使用，只在已校验的区域上按固定宽度解码
//! - [`FieldWriter`]：把记录写回固定宽度字节

mod reader;
mod text;

pub use reader::{ByteReader, FieldReader, FieldWriter};
pub use text::{decode_shift_jis, encode_shift_jis, FixedString};

/// 缓冲区中的一个区域：原始字节 + 元素数量
///
/// 只是原缓冲区上的视图，不复制数据。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region<'a> {
    pub bytes: &'a [u8],
    pub count: usize,
}

impl<'a> Region<'a> {
    pub fn new(bytes: &'a [u8], count: usize) -> Self {
        Self { bytes, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 定长记录迭代（stride 必须与校验时一致）
    pub fn records(&self, stride: usize) -> impl Iterator<Item = &'a [u8]> {
        let bytes: &'a [u8] = self.bytes;
        bytes.chunks_exact(stride).take(self.count)
    }
}
