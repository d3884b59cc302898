//! # Region Definitions
//!
//! Static tables: NSIDC Arctic region codes and named pixel boxes on the
//! neXtSIM grid.
//!
//! Region names are looked up by exact key with [`NsidcRegion::from_str`]. The
//! substring convenience (a name such as `"Arctic_shelf"` selecting `Arctic`)
//! is kept separate in [`NsidcRegion::find_in`].

use crate::error::{BrkupError, Result};
use crate::grid::BoundingBox;
use std::fmt;
use std::str::FromStr;

/// Regions of the NSIDC Arctic regions raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NsidcRegion {
    Other,
    Japan,
    Bering,
    Hudson,
    StLaurent,
    Greenland,
    Labrador,
    Barents,
    Kara,
    Laptev,
    Siberia,
    Chukchi,
    Beaufort,
    Caa,
    Arctic,
    Land,
    Coast,
}

impl NsidcRegion {
    /// All regions in table order.
    pub const ALL: [NsidcRegion; 17] = [
        NsidcRegion::Other,
        NsidcRegion::Japan,
        NsidcRegion::Bering,
        NsidcRegion::Hudson,
        NsidcRegion::StLaurent,
        NsidcRegion::Greenland,
        NsidcRegion::Labrador,
        NsidcRegion::Barents,
        NsidcRegion::Kara,
        NsidcRegion::Laptev,
        NsidcRegion::Siberia,
        NsidcRegion::Chukchi,
        NsidcRegion::Beaufort,
        NsidcRegion::Caa,
        NsidcRegion::Arctic,
        NsidcRegion::Land,
        NsidcRegion::Coast,
    ];

    /// Category code in the NSIDC raster.
    pub fn code(&self) -> i32 {
        match self {
            NsidcRegion::Other => 1,
            NsidcRegion::Japan => 2,
            NsidcRegion::Bering => 3,
            NsidcRegion::Hudson => 4,
            NsidcRegion::StLaurent => 5,
            NsidcRegion::Greenland => 6,
            NsidcRegion::Labrador => 7,
            NsidcRegion::Barents => 8,
            NsidcRegion::Kara => 9,
            NsidcRegion::Laptev => 10,
            NsidcRegion::Siberia => 11,
            NsidcRegion::Chukchi => 12,
            NsidcRegion::Beaufort => 13,
            NsidcRegion::Caa => 14,
            NsidcRegion::Arctic => 15,
            NsidcRegion::Land => 20,
            NsidcRegion::Coast => 21,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NsidcRegion::Other => "Other",
            NsidcRegion::Japan => "Japan",
            NsidcRegion::Bering => "Bering",
            NsidcRegion::Hudson => "Hudson",
            NsidcRegion::StLaurent => "StLaurent",
            NsidcRegion::Greenland => "Greenland",
            NsidcRegion::Labrador => "Labrador",
            NsidcRegion::Barents => "Barents",
            NsidcRegion::Kara => "Kara",
            NsidcRegion::Laptev => "Laptev",
            NsidcRegion::Siberia => "Siberia",
            NsidcRegion::Chukchi => "Chukchi",
            NsidcRegion::Beaufort => "Beaufort",
            NsidcRegion::Caa => "CAA",
            NsidcRegion::Arctic => "Arctic",
            NsidcRegion::Land => "Land",
            NsidcRegion::Coast => "Coast",
        }
    }

    /// First region, in table order, whose name occurs inside `text`.
    ///
    /// Overlapping matches are resolved by table order only, so prefer
    /// [`NsidcRegion::from_str`] whenever the exact name is known.
    pub fn find_in(text: &str) -> Result<Self> {
        NsidcRegion::ALL
            .iter()
            .find(|region| text.contains(region.name()))
            .copied()
            .ok_or_else(|| BrkupError::UnknownRegion(text.to_string()))
    }
}

impl FromStr for NsidcRegion {
    type Err = BrkupError;

    fn from_str(s: &str) -> Result<Self> {
        NsidcRegion::ALL
            .iter()
            .find(|region| region.name() == s)
            .copied()
            .ok_or_else(|| BrkupError::UnknownRegion(s.to_string()))
    }
}

impl fmt::Display for NsidcRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named boxes on the neXtSIM grid.
pub const NAMED_BOXES: [(&str, BoundingBox); 2] = [
    ("Beaufort", BoundingBox::new(95, 225, 425, 575)),
    ("Large_Arctic", BoundingBox::new(0, 528, 0, 603)),
];

/// Box used when no name is given.
pub const DEFAULT_BOX: &str = "Large_Arctic";

/// Looks up a named box; `None` selects [`DEFAULT_BOX`].
pub fn named_box(name: Option<&str>) -> Result<BoundingBox> {
    let name = name.unwrap_or(DEFAULT_BOX);
    NAMED_BOXES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, bbox)| *bbox)
        .ok_or_else(|| BrkupError::UnknownBox(name.to_string()))
}
