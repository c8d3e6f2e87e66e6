//! 特殊骨骼名称表
//!
//! 名称是 Shift-JIS 原始字节，按字节完全匹配。

/// センター
pub const CENTER_BONE_NAME: &[u8] = &[0x83, 0x5a, 0x83, 0x93, 0x83, 0x5e, 0x81, 0x5b];
/// 左ひざ
pub const LEFT_KNEE_BONE_NAME: &[u8] = &[0x8d, 0xb6, 0x82, 0xd0, 0x82, 0xb4];
/// 右ひざ
pub const RIGHT_KNEE_BONE_NAME: &[u8] = &[0x89, 0x45, 0x82, 0xd0, 0x82, 0xb4];
/// 左足ＩＫ
pub const LEFT_LEG_IK_BONE_NAME: &[u8] = &[0x8d, 0xb6, 0x91, 0xab, 0x82, 0x68, 0x82, 0x6a];
/// 右足ＩＫ
pub const RIGHT_LEG_IK_BONE_NAME: &[u8] = &[0x89, 0x45, 0x91, 0xab, 0x82, 0x68, 0x82, 0x6a];
/// 左つま先ＩＫ
pub const LEFT_TOE_IK_BONE_NAME: &[u8] = &[
    0x8d, 0xb6, 0x82, 0xc2, 0x82, 0xdc, 0x90, 0xe6, 0x82, 0x68, 0x82, 0x6a,
];
/// 右つま先ＩＫ
pub const RIGHT_TOE_IK_BONE_NAME: &[u8] = &[
    0x89, 0x45, 0x82, 0xc2, 0x82, 0xdc, 0x90, 0xe6, 0x82, 0x68, 0x82, 0x6a,
];

const MOTION_INDEPENDENT_BONE_NAMES: &[&[u8]] = &[
    CENTER_BONE_NAME,
    LEFT_LEG_IK_BONE_NAME,
    RIGHT_LEG_IK_BONE_NAME,
    LEFT_TOE_IK_BONE_NAME,
    RIGHT_TOE_IK_BONE_NAME,
];

const AXIS_LOCKED_BONE_NAMES: &[&[u8]] = &[LEFT_KNEE_BONE_NAME, RIGHT_KNEE_BONE_NAME];

/// 构建骨骼和 IK 链时使用的名称表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedNames {
    /// 与动作无关的骨骼（快照时位置相对于中心偏移）
    pub motion_independent: &'static [&'static [u8]],
    /// IK 中只能绕 X 轴旋转的骨骼（膝盖）
    pub axis_locked: &'static [&'static [u8]],
}

impl ReservedNames {
    pub const DEFAULT: Self = Self {
        motion_independent: MOTION_INDEPENDENT_BONE_NAMES,
        axis_locked: AXIS_LOCKED_BONE_NAMES,
    };

    /// 不做任何特殊处理
    pub const NONE: Self = Self {
        motion_independent: &[],
        axis_locked: &[],
    };

    pub fn is_motion_independent(&self, name: &[u8]) -> bool {
        self.motion_independent.iter().any(|n| *n == name)
    }

    pub fn is_axis_locked(&self, name: &[u8]) -> bool {
        self.axis_locked.iter().any(|n| *n == name)
    }
}

impl Default for ReservedNames {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::encode_shift_jis;

    #[test]
    fn test_constants_match_encoded_names() {
        assert_eq!(encode_shift_jis("センター"), CENTER_BONE_NAME);
        assert_eq!(encode_shift_jis("左ひざ"), LEFT_KNEE_BONE_NAME);
        assert_eq!(encode_shift_jis("右ひざ"), RIGHT_KNEE_BONE_NAME);
        assert_eq!(encode_shift_jis("右つま先ＩＫ"), RIGHT_TOE_IK_BONE_NAME);
    }

    #[test]
    fn test_lookup_is_exact() {
        let names = ReservedNames::DEFAULT;
        assert!(names.is_axis_locked(LEFT_KNEE_BONE_NAME));
        assert!(!names.is_axis_locked(&LEFT_KNEE_BONE_NAME[..4]));
        assert!(names.is_motion_independent(CENTER_BONE_NAME));
        assert!(!ReservedNames::NONE.is_motion_independent(CENTER_BONE_NAME));
    }
}
