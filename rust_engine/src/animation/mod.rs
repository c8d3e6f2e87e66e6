//! 动画系统
//!
//! 提供 VMD 动作解析、关键帧插值、动作播放与循环衔接。

mod bezier;
mod keyframe;
mod layout;
mod motion;
mod motion_track;
mod vmd_loader;

pub use bezier::{InterpolationCurve, TABLE_SIZE};
pub use keyframe::{
    linear_bone_table, BoneKeyframe, CameraKeyframe, Keyframe, KeyframeName, LightKeyframe,
    MorphKeyframe, SelfShadowKeyframe, Timed,
};
pub use layout::{MotionError, MotionLayout};
pub use motion::{Motion, MotionName, MotionStatus};
pub use motion_track::{
    BoneFrameTransform, BoneMotionTrack, CameraMotionTrack, CameraState, LightMotionTrack,
    LightState, LoopContext, MorphMotionTrack, MotionTrack, LOOP_START_MARGIN,
};
pub use vmd_loader::{build_motion, load_vmd, load_vmd_file, load_with};
