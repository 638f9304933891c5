//! Move timing
//!
//! Trapezoidal feedrate profile: accelerate from the previous move's feedrate,
//! cruise if there is room, decelerate symmetrically. Good enough for progress
//! estimates; no jerk or per-axis limits.

use crate::machine::Vec4;

/// Length used for timing a move from `from` to `to`
///
/// Planar XY length when X or Y changed, otherwise |dZ|, otherwise |dE|.
pub fn travel_distance(from: &Vec4, to: &Vec4) -> f64 {
    if from.x != to.x || from.y != to.y {
        from.xy().distance(&to.xy())
    } else if from.z != to.z {
        (to.z - from.z).abs()
    } else {
        (to.e - from.e).abs()
    }
}

/// Duration model shared by every move of a pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingModel {
    /// units/s²; zero derives the acceleration from each move
    acceleration: f64,
    move_overhead: f64,
}

impl TimingModel {
    /// `acceleration` is in units/min², `move_overhead` in seconds
    pub fn new(acceleration: f64, move_overhead: f64) -> Self {
        Self {
            acceleration: acceleration / 3600.0,
            move_overhead,
        }
    }

    pub fn move_overhead(&self) -> f64 {
        self.move_overhead
    }

    /// Seconds to cover `distance` at `feedrate`, entering at `initial` (both units/min)
    pub fn segment_duration(&self, distance: f64, feedrate: f64, initial: f64) -> f64 {
        if distance <= 0.0 || !distance.is_finite() {
            return 0.0;
        }

        let v_target = feedrate / 60.0;
        let v_initial = initial / 60.0;
        if v_target <= 0.0 || !v_target.is_finite() {
            return 0.0;
        }

        let cruise = distance / v_target;
        let duration = if self.acceleration > 0.0 {
            self.configured(distance, v_target, v_initial)
        } else {
            derived(distance, v_target, v_initial)
        };

        if duration.is_finite() && duration >= 0.0 {
            duration
        } else {
            cruise
        }
    }

    fn configured(&self, distance: f64, v_target: f64, v_initial: f64) -> f64 {
        let a = self.acceleration;
        let t_ramp = (v_target - v_initial).abs() / a;
        let d_ramp = 0.5 * (v_target + v_initial) * t_ramp;

        if 2.0 * d_ramp <= distance {
            2.0 * t_ramp + (distance - 2.0 * d_ramp) / v_target
        } else {
            let t_const = distance / v_target;
            let v_half = v_initial + a * t_const / 2.0;
            (2.0 * v_half - v_initial) / a
        }
    }
}

/// Acceleration implied by reaching `v_target` within the constant-speed time
fn derived(distance: f64, v_target: f64, v_initial: f64) -> f64 {
    let t_const = distance / v_target;
    let a = (v_target - v_initial) / t_const;
    if a == 0.0 {
        return t_const;
    }

    let v_half = v_initial + a * t_const / 2.0;
    if v_half == v_target {
        let t_accel = (v_target - v_initial) / a;
        let d_accel = 0.5 * (v_target + v_initial) * t_accel;
        2.0 * t_accel + (distance - 2.0 * d_accel) / v_target
    } else {
        (2.0 * v_half - v_initial) / a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_distance_prefers_planar_length() {
        let from = Vec4::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(travel_distance(&from, &Vec4::new(3.0, 4.0, 9.0, 1.0)), 5.0);
        assert_eq!(travel_distance(&from, &Vec4::new(0.0, 0.0, 0.4, 1.0)), 0.4);
        assert_eq!(travel_distance(&from, &Vec4::new(0.0, 0.0, 0.0, -2.0)), 2.0);
        assert_eq!(travel_distance(&from, &from), 0.0);
    }

    #[test]
    fn test_derived_from_rest_matches_cruise() {
        let model = TimingModel::new(0.0, 0.0);
        // 10 mm at 1500 mm/min from standstill
        assert!(approx(model.segment_duration(10.0, 1500.0, 0.0), 0.4));
    }

    #[test]
    fn test_derived_at_speed_is_cruise() {
        let model = TimingModel::new(0.0, 0.0);
        assert!(approx(model.segment_duration(30.0, 1800.0, 1800.0), 1.0));
    }

    #[test]
    fn test_decelerating_move_falls_back_to_cruise() {
        let model = TimingModel::new(0.0, 0.0);
        let duration = model.segment_duration(10.0, 600.0, 3000.0);
        assert!(duration.is_finite());
        assert!(duration >= 0.0);
    }

    #[test]
    fn test_zero_distance_takes_no_time() {
        let model = TimingModel::new(0.0, 0.5);
        assert_eq!(model.segment_duration(0.0, 1500.0, 0.0), 0.0);
        assert_eq!(model.move_overhead(), 0.5);
    }

    #[test]
    fn test_configured_acceleration_with_cruise() {
        // 3000 mm/s² expressed per minute²
        let model = TimingModel::new(3000.0 * 3600.0, 0.0);
        // 0 -> 50 mm/s takes 1/60 s over 5/12 mm each way
        let duration = model.segment_duration(100.0, 3000.0, 0.0);
        let t_ramp = 50.0 / 3000.0;
        let d_ramp = 0.5 * 50.0 * t_ramp;
        assert!(approx(duration, 2.0 * t_ramp + (100.0 - 2.0 * d_ramp) / 50.0));
        assert!(duration > 2.0);
    }

    #[test]
    fn test_configured_acceleration_short_move() {
        let model = TimingModel::new(100.0 * 3600.0, 0.0);
        // ramp alone would need 12.5 mm each way
        let duration = model.segment_duration(1.0, 3000.0, 0.0);
        assert!(duration.is_finite());
        assert!(duration > 0.0);
    }
}
