//! Fan curve model for temperature-based speed control.
//!
//! A curve is an ordered list of `(temperature, speed)` points evaluated
//! as a step function: the last point whose temperature is strictly below
//! the observed reading determines the speed. Below the first point the
//! speed is 0; at or above every point it is the last point's speed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One step of a fan's control function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Threshold temperature in degrees Celsius.
    pub temperature: u8,
    /// Fan speed percent (0-100) demanded above the threshold.
    pub speed: u8,
}

/// Immutable, ascending-sorted fan curve.
///
/// Constructed once from configuration and shared by reference between
/// the control loop's zones.
///
/// # Example
///
/// ```
/// use lumeond::fan_curve::FanCurve;
///
/// let curve = FanCurve::from_points([(40, 20), (60, 50), (80, 100)]);
/// assert_eq!(curve.speed_for(55.0), 20);
/// assert_eq!(curve.speed_for(70.0), 50);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanCurve {
    points: Vec<CurvePoint>,
}

impl FanCurve {
    /// Builds a curve from `(temperature, speed)` pairs.
    ///
    /// Points are sorted ascending by temperature; on duplicate
    /// temperatures the last pair wins.
    pub fn from_points(points: impl IntoIterator<Item = (u8, u8)>) -> Self {
        let ordered: BTreeMap<u8, u8> = points.into_iter().collect();

        Self {
            points: ordered
                .into_iter()
                .map(|(temperature, speed)| CurvePoint { temperature, speed })
                .collect(),
        }
    }

    /// Evaluates the curve for an observed temperature.
    ///
    /// Walks the ordered points, keeping the speed of the last point whose
    /// temperature is strictly below the reading, and stops at the first
    /// point that is not exceeded.
    pub fn speed_for(&self, temperature: f32) -> u8 {
        let observed = temperature.clamp(0.0, f32::from(u8::MAX)) as u8;

        let mut speed = 0;
        for point in &self.points {
            if observed > point.temperature {
                speed = point.speed;
            } else {
                break;
            }
        }
        speed
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn reference_curve() -> FanCurve {
        FanCurve::from_points([(40, 20), (60, 50), (80, 100)])
    }

    #[test]
    fn below_first_point_is_zero() {
        assert_eq!(reference_curve().speed_for(30.0), 0);
        assert_eq!(reference_curve().speed_for(40.0), 0);
    }

    #[test]
    fn above_last_point_is_last_speed() {
        assert_eq!(reference_curve().speed_for(81.0), 100);
        assert_eq!(reference_curve().speed_for(250.0), 100);
    }

    #[test]
    fn between_points_previous_step_wins() {
        let curve = reference_curve();
        assert_eq!(curve.speed_for(55.0), 20);
        assert_eq!(curve.speed_for(70.0), 50);
    }

    #[test]
    fn negative_reading_clamps_to_zero() {
        assert_eq!(reference_curve().speed_for(-12.5), 0);
    }

    #[test]
    fn empty_curve_always_demands_zero() {
        let curve = FanCurve::default();
        assert!(curve.is_empty());
        assert_eq!(curve.speed_for(90.0), 0);
    }

    #[test]
    fn points_are_sorted_ascending() {
        let curve = FanCurve::from_points([(80, 100), (40, 20), (60, 50)]);
        let temps: Vec<u8> = curve.points().iter().map(|p| p.temperature).collect();
        assert_eq!(temps, vec![40, 60, 80]);
    }

    #[test]
    fn duplicate_temperature_last_wins() {
        let curve = FanCurve::from_points([(40, 20), (40, 35)]);
        assert_eq!(
            curve.points(),
            [CurvePoint {
                temperature: 40,
                speed: 35
            }]
        );
        assert_eq!(curve.speed_for(45.0), 35);
    }

    proptest! {
        #[test]
        fn speed_is_non_decreasing_in_temperature(
            points in prop::collection::btree_map(0u8..=255, 0u8..=100, 1..8),
            temps in prop::collection::vec(-10.0f32..300.0, 2..20),
        ) {
            // Monotonicity is a property of well-formed curves: hotter
            // points must not demand less cooling. Re-pair the sorted
            // temperatures with their speeds in ascending order.
            let thresholds: Vec<u8> = points.keys().copied().collect();
            let mut speeds: Vec<u8> = points.values().copied().collect();
            speeds.sort_unstable();

            let curve = FanCurve::from_points(thresholds.into_iter().zip(speeds));
            let mut sorted = temps;
            sorted.sort_by(|a, b| a.total_cmp(b));

            let mut last = 0;
            for t in sorted {
                let speed = curve.speed_for(t);
                prop_assert!(speed >= last);
                last = speed;
            }
        }

        #[test]
        fn speed_is_always_one_of_the_points_or_zero(
            points in prop::collection::btree_map(0u8..=255, 0u8..=100, 1..8),
            temp in -10.0f32..300.0,
        ) {
            let curve = FanCurve::from_points(points.clone());
            let speed = curve.speed_for(temp);
            prop_assert!(speed == 0 || points.values().any(|&s| s == speed));
        }
    }
}
