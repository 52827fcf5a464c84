//! Preset page layouts

use std::fmt;
use std::str::FromStr;

use crate::error::StudioError;
use crate::geometry::PercentRect;

const TWO_PANEL_VERTICAL: [PercentRect; 2] = [
    PercentRect::new(5.0, 5.0, 90.0, 44.0),
    PercentRect::new(5.0, 51.0, 90.0, 44.0),
];

const THREE_PANEL_VERTICAL: [PercentRect; 3] = [
    PercentRect::new(5.0, 5.0, 90.0, 28.0),
    PercentRect::new(5.0, 36.0, 90.0, 28.0),
    PercentRect::new(5.0, 67.0, 90.0, 28.0),
];

const FOUR_GRID: [PercentRect; 4] = [
    PercentRect::new(5.0, 5.0, 44.0, 44.0),
    PercentRect::new(51.0, 5.0, 44.0, 44.0),
    PercentRect::new(5.0, 51.0, 44.0, 44.0),
    PercentRect::new(51.0, 51.0, 44.0, 44.0),
];

/// Named arrangement of placeholder panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutPreset {
    TwoPanelVertical,
    ThreePanelVertical,
    FourGrid,
}

impl LayoutPreset {
    pub const ALL: [LayoutPreset; 3] = [
        LayoutPreset::TwoPanelVertical,
        LayoutPreset::ThreePanelVertical,
        LayoutPreset::FourGrid,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayoutPreset::TwoPanelVertical => "2-panel-vertical",
            LayoutPreset::ThreePanelVertical => "3-panel-vertical",
            LayoutPreset::FourGrid => "4-grid",
        }
    }

    /// Placeholder geometries in stacking order (index = zIndex)
    pub fn geometries(&self) -> &'static [PercentRect] {
        match self {
            LayoutPreset::TwoPanelVertical => &TWO_PANEL_VERTICAL,
            LayoutPreset::ThreePanelVertical => &THREE_PANEL_VERTICAL,
            LayoutPreset::FourGrid => &FOUR_GRID,
        }
    }

    pub fn panel_count(&self) -> usize {
        self.geometries().len()
    }
}

impl fmt::Display for LayoutPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayoutPreset {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| StudioError::UnknownLayout(s.to_string()))
    }
}
