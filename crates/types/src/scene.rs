//! Scene: the value the compositor consumes each frame

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::layer::Layer;

/// Clockwise rotation applied to the composed image
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// 90 and 270 lay the scene out on a transposed canvas
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {}", other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Ordered layer list plus output rotation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Scene {
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl Scene {
    pub fn new(rotation: Rotation, layers: Vec<Layer>) -> Self {
        Self { rotation, layers }
    }

    pub fn enabled_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.is_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_parsing() {
        let r: Rotation = serde_json::from_str("270").unwrap();
        assert_eq!(r, Rotation::Deg270);
        assert!(r.swaps_axes());
        assert!(serde_json::from_str::<Rotation>("45").is_err());
        assert_eq!(serde_json::to_string(&Rotation::Deg90).unwrap(), "90");
    }
}
