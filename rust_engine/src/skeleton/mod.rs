//! 骨骼系统和 IK 求解器

mod bone;
mod ik_solver;
mod manager;
mod names;

pub use bone::{Bone, BoneKind, BoneName, BONE_STRIDE};
pub(crate) use bone::{resolve_link, RawBone};
pub use ik_solver::{IkLink, IkSolver, IK_HEADER_SIZE, IK_LINK_STRIDE};
pub(crate) use ik_solver::RawIkChain;
pub use manager::BoneManager;
pub use names::*;
