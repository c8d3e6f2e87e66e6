//! 小端字节游标

use byteorder::{ByteOrder, LittleEndian};
use glam::{Vec2, Vec3, Vec4};

/// 校验用游标：每次读取都检查剩余长度
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 剩余未消费字节数
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(len)?;
        let slice = self.bytes.get(self.offset..end)?;
        self.offset = end;
        Some(slice)
    }

    /// 不移动游标地查看接下来的 `len` 字节
    pub fn peek(&self, len: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(len)?;
        self.bytes.get(self.offset..end)
    }

    /// 取 `count * stride` 字节（乘法溢出视为越界）
    pub fn take_records(&mut self, count: usize, stride: usize) -> Option<&'a [u8]> {
        let len = count.checked_mul(stride)?;
        self.take(len)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.take(2).map(LittleEndian::read_u16)
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        self.take(4).map(LittleEndian::read_f32)
    }
}

/// 构建用字段读取器
///
/// 只能用在 [`ByteReader`] 已经确认长度的记录上，字段偏移固定，因此不返回错误。
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn field(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        slice
    }

    pub fn skip(&mut self, len: usize) {
        self.offset += len;
    }

    pub fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(self.field(N));
        out
    }

    /// 变长子列表：直接返回原缓冲区切片
    pub fn slice(&mut self, len: usize) -> &'a [u8] {
        self.field(len)
    }

    pub fn u8(&mut self) -> u8 {
        self.field(1)[0]
    }

    pub fn u16(&mut self) -> u16 {
        LittleEndian::read_u16(self.field(2))
    }

    pub fn i16(&mut self) -> i16 {
        LittleEndian::read_i16(self.field(2))
    }

    pub fn u32(&mut self) -> u32 {
        LittleEndian::read_u32(self.field(4))
    }

    pub fn f32(&mut self) -> f32 {
        LittleEndian::read_f32(self.field(4))
    }

    pub fn vec2(&mut self) -> Vec2 {
        Vec2::new(self.f32(), self.f32())
    }

    pub fn vec3(&mut self) -> Vec3 {
        Vec3::new(self.f32(), self.f32(), self.f32())
    }

    pub fn vec4(&mut self) -> Vec4 {
        Vec4::new(self.f32(), self.f32(), self.f32(), self.f32())
    }
}

/// 定长记录写入器，写入顺序与 [`FieldReader`] 的读取顺序镜像
#[derive(Debug, Clone)]
pub struct FieldWriter<const N: usize> {
    bytes: [u8; N],
    offset: usize,
}

impl<const N: usize> FieldWriter<N> {
    pub fn new() -> Self {
        Self {
            bytes: [0u8; N],
            offset: 0,
        }
    }

    fn field(&mut self, len: usize) -> &mut [u8] {
        let start = self.offset;
        self.offset += len;
        &mut self.bytes[start..start + len]
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.field(data.len()).copy_from_slice(data);
    }

    pub fn u8(&mut self, v: u8) {
        self.field(1)[0] = v;
    }

    pub fn u32(&mut self, v: u32) {
        LittleEndian::write_u32(self.field(4), v);
    }

    pub fn f32(&mut self, v: f32) {
        LittleEndian::write_f32(self.field(4), v);
    }

    pub fn vec3(&mut self, v: Vec3) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
    }

    pub fn finish(self) -> [u8; N] {
        debug_assert_eq!(self.offset, N, "record not fully written");
        self.bytes
    }
}

impl<const N: usize> Default for FieldWriter<N> {
    fn default() -> Self {
        Self::new()
    }
}
