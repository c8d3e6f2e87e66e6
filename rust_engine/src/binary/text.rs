//! 定长名称字段
//!
//! PMD/VMD 的名称是 Shift-JIS 编码、以 NUL 结尾的定长字节串。
//! 名称比较一律使用截断后的原始字节，解码只用于显示。

use std::fmt;

use encoding_rs::SHIFT_JIS;

/// 定长字节串字段
///
/// 保留完整原始字节（NUL 之后的填充也保留），以便原样写回。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedString<const N: usize>([u8; N]);

impl<const N: usize> FixedString<N> {
    pub fn from_raw(raw: [u8; N]) -> Self {
        Self(raw)
    }

    /// 复制最多 N 字节，其余补 0
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut raw = [0u8; N];
        let len = bytes.len().min(N);
        raw[..len].copy_from_slice(&bytes[..len]);
        Self(raw)
    }

    /// 从 UTF-8 文本编码为 Shift-JIS（超长部分截断）
    pub fn encode(text: &str) -> Self {
        Self::from_bytes(&encode_shift_jis(text))
    }

    pub fn raw(&self) -> &[u8; N] {
        &self.0
    }

    /// 第一个 NUL 之前的字节，永远不超过字段宽度
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        &self.0[..end]
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        decode_shift_jis(self.as_bytes())
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// 解码 Shift-JIS 字符串
pub fn decode_shift_jis(bytes: &[u8]) -> String {
    let (decoded, _, _) = SHIFT_JIS.decode(bytes);
    decoded.into_owned()
}

pub fn encode_shift_jis(text: &str) -> Vec<u8> {
    let (encoded, _, _) = SHIFT_JIS.encode(text);
    encoded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_at_nul() {
        let name = FixedString::<8>::from_raw(*b"abc\0\xfd\xfd\xfd\xfd");
        assert_eq!(name.as_bytes(), b"abc");
        assert_eq!(name.raw()[4], 0xfd);
    }

    #[test]
    fn test_unterminated_stays_within_width() {
        let name = FixedString::<4>::from_bytes(b"abcdefgh");
        assert_eq!(name.as_bytes(), b"abcd");
    }

    #[test]
    fn test_shift_jis_roundtrip() {
        let name = FixedString::<20>::encode("センター");
        assert_eq!(name.as_bytes(), &[0x83, 0x5a, 0x83, 0x93, 0x83, 0x5e, 0x81, 0x5b]);
        assert_eq!(name.to_string_lossy(), "センター");
    }
}
