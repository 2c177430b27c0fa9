use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Binary verdict for one inspected item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemClass {
    Damaged,
    Intact,
}

impl ItemClass {
    /// Stable vocabulary used in the report table and CSV export.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemClass::Damaged => "Damaged",
            ItemClass::Intact => "Intact",
        }
    }

    /// Detail text attached to committed classifications.
    pub fn detail(&self) -> &'static str {
        match self {
            ItemClass::Damaged => "Defective item detected.",
            ItemClass::Intact => "Non-defective item.",
        }
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Damaged" => Ok(ItemClass::Damaged),
            "Intact" => Ok(ItemClass::Intact),
            other => Err(anyhow!("unknown item class '{}'", other)),
        }
    }
}

/// Axis-aligned box in frame-pixel coordinates. y grows downward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Horizontal midpoint, the basis of the tracker's identity heuristic.
    pub fn mid_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    /// Bottom edge (largest y).
    pub fn bottom(&self) -> f32 {
        self.y2
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// One inference result, scoped to a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: ItemClass,
    /// Confidence score in [0, 1].
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class: ItemClass, confidence: f32) -> Self {
        Self {
            bbox,
            class,
            confidence,
        }
    }
}
