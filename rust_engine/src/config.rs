//! 引擎配置
//!
//! 所有参数扁平化。核心算法只接收显式传入的配置，
//! 全局实例仅供便捷加载函数使用。

use std::sync::RwLock;

use glam::{Quat, Vec3};
use once_cell::sync::Lazy;

use crate::skeleton::ReservedNames;

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 是否将 MMD 的左手坐标系转换为右手坐标系（翻转 Z 轴），默认 true
    pub flip_handedness: bool,

    /// 循环平滑窗口（帧），默认 20.0
    /// 每次循环回绕后减少 1 帧，直到 0
    pub smear_frames: f32,

    /// 特殊骨骼名称表（Shift-JIS 原始字节）
    pub reserved_names: ReservedNames,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flip_handedness: true,
            smear_frames: 20.0,
            reserved_names: ReservedNames::DEFAULT,
        }
    }
}

impl EngineConfig {
    /// 使用原始左手坐标系（不做任何翻转）
    pub fn left_handed() -> Self {
        Self {
            flip_handedness: false,
            ..Self::default()
        }
    }

    pub fn handedness(&self) -> Handedness {
        Handedness {
            flip: self.flip_handedness,
        }
    }
}

/// 坐标系转换
///
/// 翻转是自逆的：对同一数据调用两次得到原值，写回二进制时使用同一函数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handedness {
    pub flip: bool,
}

impl Handedness {
    pub const IDENTITY: Self = Self { flip: false };

    /// 位置/方向向量：Z 取反
    pub fn position(self, v: Vec3) -> Vec3 {
        if self.flip {
            Vec3::new(v.x, v.y, -v.z)
        } else {
            v
        }
    }

    /// 欧拉角：关于 XY 平面镜像后 X、Y 旋转方向相反
    pub fn euler(self, v: Vec3) -> Vec3 {
        if self.flip {
            Vec3::new(-v.x, -v.y, v.z)
        } else {
            v
        }
    }

    /// 四元数：与欧拉角相同的镜像规则
    pub fn rotation(self, q: Quat) -> Quat {
        if self.flip {
            Quat::from_xyzw(-q.x, -q.y, q.z, q.w)
        } else {
            q
        }
    }

    /// 翻转区间后按分量重新排序，保证 lower <= upper
    pub fn position_range(self, lower: Vec3, upper: Vec3) -> (Vec3, Vec3) {
        let (a, b) = (self.position(lower), self.position(upper));
        (a.min(b), a.max(b))
    }

    pub fn euler_range(self, lower: Vec3, upper: Vec3) -> (Vec3, Vec3) {
        let (a, b) = (self.euler(lower), self.euler(upper));
        (a.min(b), a.max(b))
    }
}

/// 全局配置实例
static ENGINE_CONFIG: Lazy<RwLock<EngineConfig>> =
    Lazy::new(|| RwLock::new(EngineConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> EngineConfig {
    match ENGINE_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// 手动设置配置
pub fn set_config(config: EngineConfig) {
    match ENGINE_CONFIG.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(EngineConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_is_involution() {
        let h = Handedness { flip: true };
        let v = Vec3::new(1.0, -2.0, 3.5);
        let q = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9);
        assert_eq!(h.position(h.position(v)), v);
        assert_eq!(h.euler(h.euler(v)), v);
        assert_eq!(h.rotation(h.rotation(q)), q);
    }

    #[test]
    fn test_flip_mirrors_rotated_point() {
        let h = Handedness { flip: true };
        let q = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.7, 0.2);
        let p = Vec3::new(0.5, 1.0, -2.0);
        let mirrored = h.rotation(q) * h.position(p);
        assert!(mirrored.abs_diff_eq(h.position(q * p), 1e-5));
    }

    #[test]
    fn test_range_stays_ordered() {
        let h = Handedness { flip: true };
        let (lo, hi) = h.position_range(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 5.0));
        assert_eq!(lo, Vec3::new(-1.0, -2.0, -5.0));
        assert_eq!(hi, Vec3::new(1.0, 2.0, 3.0));
    }
}
