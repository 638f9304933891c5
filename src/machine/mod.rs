//! Machine Model
//!
//! Coordinates plus the authoritative motion state.

pub mod geometry;
pub mod state;

pub use geometry::{Axis, AxisSet, Vec2, Vec3, Vec4};
pub use state::{ArcPath, HomeKind, MachineState, Motion, Transition, Units};
