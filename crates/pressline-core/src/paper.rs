// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ISO 216 "A" series paper sizes and the medium size descriptor carried by
// every printable document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PresslineError;

/// Physical medium dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaSize {
    pub width_mm: u32,
    pub height_mm: u32,
}

impl MediaSize {
    pub const fn new(width_mm: u32, height_mm: u32) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }
}

impl fmt::Display for MediaSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}mm", self.width_mm, self.height_mm)
    }
}

/// Standard paper sizes defined in ISO 216.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsoPaperSize {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    A8,
    A9,
    A10,
}

impl IsoPaperSize {
    /// Every size in the catalog, largest first.
    pub const ALL: [IsoPaperSize; 11] = [
        Self::A0,
        Self::A1,
        Self::A2,
        Self::A3,
        Self::A4,
        Self::A5,
        Self::A6,
        Self::A7,
        Self::A8,
        Self::A9,
        Self::A10,
    ];

    /// Dimensions in millimetres (portrait).
    pub const fn size(&self) -> MediaSize {
        match self {
            Self::A0 => MediaSize::new(841, 1189),
            Self::A1 => MediaSize::new(594, 841),
            Self::A2 => MediaSize::new(420, 594),
            Self::A3 => MediaSize::new(297, 420),
            Self::A4 => MediaSize::new(210, 297),
            Self::A5 => MediaSize::new(148, 210),
            Self::A6 => MediaSize::new(105, 148),
            Self::A7 => MediaSize::new(74, 105),
            Self::A8 => MediaSize::new(52, 74),
            Self::A9 => MediaSize::new(37, 52),
            Self::A10 => MediaSize::new(26, 37),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::A0 => "A0",
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::A6 => "A6",
            Self::A7 => "A7",
            Self::A8 => "A8",
            Self::A9 => "A9",
            Self::A10 => "A10",
        }
    }

    /// Reverse lookup: the catalog entry with exactly these dimensions.
    pub fn from_size(size: MediaSize) -> Option<Self> {
        Self::ALL.into_iter().find(|iso| iso.size() == size)
    }
}

impl fmt::Display for IsoPaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IsoPaperSize {
    type Err = PresslineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|iso| iso.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PresslineError::UnknownPaperSize(wanted.to_string()))
    }
}

impl From<IsoPaperSize> for MediaSize {
    fn from(iso: IsoPaperSize) -> Self {
        iso.size()
    }
}
