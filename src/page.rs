use crate::error::CanvasError;
use crate::types::{Size, Unit};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperFormat {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    B4,
    B5,
    Letter,
    Legal,
    Tabloid,
}

impl PaperFormat {
    // Portrait width x height in millimetres.
    fn portrait_mm(self) -> (f32, f32) {
        match self {
            PaperFormat::A0 => (841.0, 1189.0),
            PaperFormat::A1 => (594.0, 841.0),
            PaperFormat::A2 => (420.0, 594.0),
            PaperFormat::A3 => (297.0, 420.0),
            PaperFormat::A4 => (210.0, 297.0),
            PaperFormat::A5 => (148.0, 210.0),
            PaperFormat::A6 => (105.0, 148.0),
            PaperFormat::B4 => (250.0, 353.0),
            PaperFormat::B5 => (176.0, 250.0),
            PaperFormat::Letter => (215.9, 279.4),
            PaperFormat::Legal => (215.9, 355.6),
            PaperFormat::Tabloid => (279.4, 431.8),
        }
    }
}

impl FromStr for PaperFormat {
    type Err = CanvasError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "a0" => Ok(PaperFormat::A0),
            "a1" => Ok(PaperFormat::A1),
            "a2" => Ok(PaperFormat::A2),
            "a3" => Ok(PaperFormat::A3),
            "a4" => Ok(PaperFormat::A4),
            "a5" => Ok(PaperFormat::A5),
            "a6" => Ok(PaperFormat::A6),
            "b4" => Ok(PaperFormat::B4),
            "b5" => Ok(PaperFormat::B5),
            "letter" => Ok(PaperFormat::Letter),
            "legal" => Ok(PaperFormat::Legal),
            "tabloid" | "ledger" => Ok(PaperFormat::Tabloid),
            other => Err(CanvasError::Configuration(format!(
                "unknown paper format '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page dimensions in the caller's unit. Always obtained through [`PageGeometry::query`]
/// (or built explicitly for custom surfaces) so layout never assumes a particular format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub unit: Unit,
}

impl PageGeometry {
    pub fn query(format: PaperFormat, orientation: Orientation, unit: Unit) -> Self {
        let (short_mm, long_mm) = format.portrait_mm();
        let (width_mm, height_mm) = match orientation {
            Orientation::Portrait => (short_mm, long_mm),
            Orientation::Landscape => (long_mm, short_mm),
        };
        Self {
            width: unit.from_mm(width_mm),
            height: unit.from_mm(height_mm),
            unit,
        }
    }

    pub fn custom(width: f32, height: f32, unit: Unit) -> Self {
        Self {
            width,
            height,
            unit,
        }
    }

    pub fn size_pt(&self) -> Size {
        Size {
            width: self.unit.to_pt(self.width),
            height: self.unit.to_pt(self.height),
        }
    }
}
