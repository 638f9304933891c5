//! Immutable copies of pipeline state for hosts and viewers

use serde::Serialize;

use crate::machine::{Units, Vec3, Vec4};

/// Axis-aligned box around everything extruded so far
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(&point);
        self.max = self.max.max(&point);
    }

    pub fn size(&self) -> Vec3 {
        Vec3::new(
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub pos: Vec4,
    pub last: Vec4,
    pub offset: Vec4,
    pub feedrate: f64,
    pub relative: bool,
    pub e_relative: bool,
    pub layer_z: f64,
    /// Largest E position seen
    pub emax: f64,
    /// Seconds; zero unless duration tracking is on
    pub total_duration: f64,
    pub units: Units,
    pub tool: u8,
    /// Largest cumulative net extrusion, unaffected by E resets
    pub filament_length: f64,
    pub bounds: Option<Bounds>,
    /// Lines fed so far
    pub lines: u64,
    pub layer_count: usize,
}
