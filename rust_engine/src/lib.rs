//! MMD Engine - PMD 模型 / VMD 动作运行时
//!
//! 提供：
//! - PMD 模型与 VMD 动作的两阶段二进制解析（先校验布局，再构建实体）
//! - 骨骼层级与运动学更新（含旋转传递骨骼）
//! - 迭代式 IK 求解
//! - 关键帧轨道插值、混合与循环平滑
//! - Morph（表情）顶点混合

pub mod animation;
pub mod binary;
pub mod config;
pub mod model;
pub mod morph;
pub mod physics;
pub mod skeleton;

pub use animation::{load_vmd, load_vmd_file, Motion, MotionError, MotionStatus};
pub use config::EngineConfig;
pub use model::{load_pmd, load_pmd_file, ModelError, PmdModel};
pub use morph::{Morph, MorphManager};
pub use skeleton::{Bone, BoneManager, IkSolver};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MmdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PMD parse error: {0}")]
    PmdParse(#[from] ModelError),

    #[error("VMD parse error: {0}")]
    VmdParse(#[from] MotionError),
}

pub type Result<T> = std::result::Result<T, MmdError>;
