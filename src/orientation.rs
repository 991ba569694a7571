//! Relative rotation between the camera sensor and the display.
//!
//! Computed once when the stream is configured and cached for the session.

use std::fmt;

/// A quarter-turn rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Reduce any angle modulo 360 and snap it to the nearest quarter turn.
    pub fn from_degrees(degrees: i64) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    /// Display surface rotation index (0..=3) to degrees. Unknown indices map to 0.
    pub fn from_surface_index(index: u32) -> Self {
        match index {
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            3 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when width and height swap on screen.
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Rotation of the sensor image relative to the screen: `sensor - screen`.
///
/// `resolve(90, 0)` is `Deg270`; `resolve(0, 90)` is `Deg90`.
pub fn resolve(screen_rotation_degrees: i32, sensor_orientation_degrees: i32) -> Rotation {
    Rotation::from_degrees(
        i64::from(sensor_orientation_degrees) - i64::from(screen_rotation_degrees),
    )
}
