//! Configuration management for the toolpath interpreter.
//!
//! Handles:
//! - Command-line argument parsing
//! - Pipeline settings and their validation
//! - TOML config files (user config directory or `--config`)

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::diagnostics::DEFAULT_WARNING_CAPACITY;
use crate::error::ConfigError;
use crate::machine::Vec3;

/// Largest accepted `fade_window`
pub const MAX_FADE_WINDOW: usize = 32;

/// Command-line arguments for the toolpath tool
#[derive(Debug, Parser)]
#[command(name = "gcode-tp")]
#[command(about = "Interpret G-code into a layered toolpath")]
#[command(version)]
pub struct Args {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(
        long,
        global = true,
        default_value = "warn",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,

    #[arg(long, global = true, help = "Acceleration in units/min^2 (0 derives it per move)")]
    pub acceleration: Option<f64>,

    #[arg(long, global = true, help = "Number of faded layers below the active one")]
    pub fade_window: Option<usize>,

    #[arg(long, global = true, help = "Seconds added per move")]
    pub move_overhead: Option<f64>,

    #[arg(long, global = true, help = "Z distance within which layers are merged")]
    pub layer_tolerance: Option<f64>,

    #[arg(long, global = true, help = "Reproduce the legacy G92 E offset behaviour")]
    pub strict_compat: bool,

    #[command(subcommand)]
    pub operation: Operation,
}

#[derive(Debug, Subcommand)]
pub enum Operation {
    /// Print totals for a file: duration, layers, filament, bounds
    Analyze(FileArgs),
    /// Print every layer with its segment counts
    DumpLayers(FileArgs),
}

#[derive(Debug, clap::Args)]
pub struct FileArgs {
    /// G-code file to read
    pub file: PathBuf,

    /// Exit with status 1 when any warning was recorded
    #[arg(long)]
    pub strict: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Settings for one [`crate::Pipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// G162 target
    pub max: Vec3,
    /// G28/G161 target
    pub home: Vec3,
    pub default_feedrate: f64,
    /// units/min²; 0 derives acceleration from each move
    pub acceleration: f64,
    pub fade_window: usize,
    pub compute_duration: bool,
    /// Accepted, not implemented
    pub tessellate_arcs: bool,
    /// Seconds added per move with non-zero length; host estimators commonly
    /// use 0.05
    pub move_overhead: f64,
    pub layer_tolerance: f64,
    pub strict_compat: bool,
    pub g91_sets_extruder: bool,
    pub warning_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max: Vec3::splat(150.0),
            home: Vec3::splat(0.0),
            default_feedrate: 1000.0,
            acceleration: 0.0,
            fade_window: 6,
            compute_duration: false,
            tessellate_arcs: false,
            move_overhead: 0.0,
            layer_tolerance: 0.0,
            strict_compat: false,
            g91_sets_extruder: false,
            warning_capacity: DEFAULT_WARNING_CAPACITY,
        }
    }
}

fn non_negative(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            key,
            format!("must be finite and non-negative, got {value}"),
        ))
    }
}

impl PipelineConfig {
    /// Check every range constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fade_window > MAX_FADE_WINDOW {
            return Err(ConfigError::invalid(
                "fade_window",
                format!("must be at most {MAX_FADE_WINDOW}, got {}", self.fade_window),
            ));
        }

        non_negative("max.x", self.max.x)?;
        non_negative("max.y", self.max.y)?;
        non_negative("max.z", self.max.z)?;
        non_negative("home.x", self.home.x)?;
        non_negative("home.y", self.home.y)?;
        non_negative("home.z", self.home.z)?;
        non_negative("acceleration", self.acceleration)?;
        non_negative("move_overhead", self.move_overhead)?;
        non_negative("layer_tolerance", self.layer_tolerance)?;

        if !(self.default_feedrate.is_finite() && self.default_feedrate > 0.0) {
            return Err(ConfigError::invalid(
                "default_feedrate",
                format!("must be finite and positive, got {}", self.default_feedrate),
            ));
        }

        if self.warning_capacity == 0 {
            return Err(ConfigError::invalid("warning_capacity", "must be at least 1"));
        }

        Ok(())
    }

    /// Load a TOML file on top of the defaults and validate the result
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_file(ConfigFile::read(path)?);
        config.validate()?;
        Ok(config)
    }

    /// Overlay the keys present in `file`
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(max) = file.max {
            max.apply_to(&mut self.max);
        }
        if let Some(home) = file.home {
            home.apply_to(&mut self.home);
        }
        if let Some(value) = file.default_feedrate {
            self.default_feedrate = value;
        }
        if let Some(value) = file.acceleration {
            self.acceleration = value;
        }
        if let Some(value) = file.fade_window {
            self.fade_window = value;
        }
        if let Some(value) = file.compute_duration {
            self.compute_duration = value;
        }
        if let Some(value) = file.tessellate_arcs {
            self.tessellate_arcs = value;
        }
        if let Some(value) = file.move_overhead {
            self.move_overhead = value;
        }
        if let Some(value) = file.layer_tolerance {
            self.layer_tolerance = value;
        }
        if let Some(value) = file.strict_compat {
            self.strict_compat = value;
        }
        if let Some(value) = file.g91_sets_extruder {
            self.g91_sets_extruder = value;
        }
        if let Some(value) = file.warning_capacity {
            self.warning_capacity = value;
        }
    }
}

/// A `[max]` or `[home]` table where any axis may be left out
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialVec3 {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl PartialVec3 {
    fn apply_to(&self, target: &mut Vec3) {
        if let Some(x) = self.x {
            target.x = x;
        }
        if let Some(y) = self.y {
            target.y = y;
        }
        if let Some(z) = self.z {
            target.z = z;
        }
    }
}

/// Config file structure (matches TOML); every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub max: Option<PartialVec3>,
    pub home: Option<PartialVec3>,
    pub default_feedrate: Option<f64>,
    pub acceleration: Option<f64>,
    pub fade_window: Option<usize>,
    pub compute_duration: Option<bool>,
    pub tessellate_arcs: Option<bool>,
    pub move_overhead: Option<f64>,
    pub layer_tolerance: Option<f64>,
    pub strict_compat: Option<bool>,
    pub g91_sets_extruder: Option<bool>,
    pub warning_capacity: Option<usize>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `<config_dir>/gcode-toolpath/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gcode-toolpath").join("config.toml"))
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub pipeline: PipelineConfig,
    /// The file the pipeline settings were read from, if any
    pub config_path: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    /// Create configuration from explicit arguments
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let config_path = match &args.config {
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|path| path.is_file()),
        };

        let mut pipeline = PipelineConfig::default();
        if let Some(path) = &config_path {
            log::debug!("Loading config from {}", path.display());
            pipeline.apply_file(ConfigFile::read(path)?);
        }

        if let Some(value) = args.acceleration {
            pipeline.acceleration = value;
        }
        if let Some(value) = args.fade_window {
            pipeline.fade_window = value;
        }
        if let Some(value) = args.move_overhead {
            pipeline.move_overhead = value;
        }
        if let Some(value) = args.layer_tolerance {
            pipeline.layer_tolerance = value;
        }
        if args.strict_compat {
            pipeline.strict_compat = true;
        }

        pipeline.validate()?;

        Ok(Config {
            pipeline,
            config_path,
            log_level: args.log_level.clone(),
        })
    }
}
