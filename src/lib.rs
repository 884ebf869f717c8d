//! # invgeom is a library for inverse geometry of serial robot arms.
//!
//! A robot model is loaded from URDF and reduced to a serial chain. Joint
//! angles reaching a target point or pose are found by minimizing a scalar
//! placement error with BFGS, and every iterate can be streamed to a viewer
//! to watch the solve converge.

#![deny(unsafe_code)]

mod ik;
mod kinematics;
mod lie;
mod optimize;
mod robot;
mod viz;

pub use ik::{
    pose_cost, position_cost, solve, Goal, Solution, SolveOptions, TARGET_MARKER, TIP_MARKER,
};
pub use lie::{skew, Mat3, Twist, Vec3, Vec6, SE3};
pub use optimize::{bfgs, bfgs_with_callback, MinimizeOptions, MinimizeResult, OptimizeError};
pub use robot::{Config, Link, ModelError, Robot, SerialChain, DESCRIPTION_DIR_ENV};
pub use viz::{Color, Command, HtmlViewer, NullViewer, RecordingViewer, Viewer};
