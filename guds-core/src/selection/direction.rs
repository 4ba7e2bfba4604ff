//! Facing-relative bearing classification.
//!
//! World space is right-handed with +Z up. The left vector of a facing `f`
//! is `Z x f`, so a positive dot with it means the target is to the left.

use serde::{Deserialize, Serialize};
use vek::Vec3;

use crate::config::DirectionalConfig;

/// Bearing class of a target relative to an observer's facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Outside the forward half-plane by more than the behind threshold.
    Behind,
    /// In front and steeply above.
    Above,
    /// In front and steeply below.
    Below,
    /// To the left.
    Left,
    /// To the right.
    Right,
    /// Inside the forward cone.
    Ahead,
}

fn horizontal(v: Vec3<f32>) -> Vec3<f32> {
    let flat = Vec3::new(v.x, v.y, 0.0);
    if flat.magnitude_squared() > f32::EPSILON {
        flat.normalized()
    } else {
        Vec3::zero()
    }
}

fn side(facing: Vec3<f32>, to_target_xy: Vec3<f32>) -> Direction {
    let left = Vec3::unit_z().cross(facing);
    if left.dot(to_target_xy) > 0.0 {
        Direction::Left
    } else {
        Direction::Right
    }
}

/// Classify where `target` is as seen from `origin` looking along `facing`.
///
/// Behind wins over above and below; vertical classes are only considered
/// for targets in the forward half-plane.
#[must_use]
pub fn classify(
    origin: Vec3<f32>,
    facing: Vec3<f32>,
    target: Vec3<f32>,
    thresholds: &DirectionalConfig,
) -> Direction {
    let to_target = target - origin;
    let to_target_xy = horizontal(to_target);
    let dot_xy = to_target_xy.dot(facing);

    if dot_xy < 0.0 {
        if dot_xy < thresholds.behind_dot {
            return Direction::Behind;
        }
        return side(facing, to_target_xy);
    }

    if to_target.magnitude_squared() > f32::EPSILON {
        let vertical = to_target.normalized().z;
        if vertical.abs() > thresholds.vertical_sin {
            return if origin.z < target.z {
                Direction::Above
            } else {
                Direction::Below
            };
        }
    }
    classify_horizontal(origin, facing, target, thresholds)
}

/// Left, right or ahead only. Used when the event has no action for the
/// full classification.
#[must_use]
pub fn classify_horizontal(
    origin: Vec3<f32>,
    facing: Vec3<f32>,
    target: Vec3<f32>,
    thresholds: &DirectionalConfig,
) -> Direction {
    let to_target_xy = horizontal(target - origin);
    if to_target_xy.dot(facing) < thresholds.ahead_dot {
        side(facing, to_target_xy)
    } else {
        Direction::Ahead
    }
}
