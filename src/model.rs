//! Panel model: the set of images placed on the page

use std::fmt;

use tracing::{debug, info};

use crate::asset::{Asset, PanelImage};
use crate::geometry::{Point, PercentRect};
use crate::layout::LayoutPreset;
use crate::DEFAULT_PANEL_GEOMETRY;

/// Identificatore univoco di un pannello all'interno di una pagina
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(u64);

impl PanelId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panel-{}", self.0)
    }
}

/// A single image placement on the page
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: PanelId,
    pub rect: PercentRect,
    pub z_index: i32,
    pub image: PanelImage,
}

impl Panel {
    pub fn position(&self) -> (f64, f64) {
        (self.rect.x, self.rect.y)
    }

    pub fn size(&self) -> (f64, f64) {
        (self.rect.width, self.rect.height)
    }

    pub fn is_placeholder(&self) -> bool {
        self.image.is_placeholder()
    }
}

/// Direction of a z-order command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    Front,
    Back,
}

/// Which part of a panel a point landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Body,
    ResizeHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub panel: PanelId,
    pub target: HitTarget,
}

/// Outcome of clicking an asset thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetPlacement {
    /// The selected placeholder received the asset, geometry untouched
    FilledPlaceholder(PanelId),
    /// A new default-sized panel was appended
    Added(PanelId),
}

impl AssetPlacement {
    pub fn panel(&self) -> PanelId {
        match self {
            AssetPlacement::FilledPlaceholder(id) | AssetPlacement::Added(id) => *id,
        }
    }
}

/// Ordered set of panels plus the (single) selection.
///
/// Panels are kept in insertion order; stacking is decided by `z_index` only.
#[derive(Debug, Clone, Default)]
pub struct PageModel {
    panels: Vec<Panel>,
    selected: Option<PanelId>,
    next_id: u64,
}

impl PageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn get(&self, id: PanelId) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.panels.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PanelId) -> bool {
        self.get(id).is_some()
    }

    pub fn selected(&self) -> Option<PanelId> {
        self.selected
    }

    pub fn selected_panel(&self) -> Option<&Panel> {
        self.selected.and_then(|id| self.get(id))
    }

    fn allocate_id(&mut self) -> PanelId {
        let id = PanelId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Appends a panel at the default geometry and selects it
    pub fn add_panel(&mut self, asset: Asset) -> PanelId {
        let id = self.allocate_id();
        let z_index = self.panels.len() as i32;
        debug!(%id, z_index, asset = %asset.id, "panel added");
        self.panels.push(Panel {
            id,
            rect: DEFAULT_PANEL_GEOMETRY,
            z_index,
            image: PanelImage::Filled(asset),
        });
        self.selected = Some(id);
        id
    }

    /// Replaces every panel with the placeholders of `preset` and drops the selection
    pub fn apply_layout(&mut self, preset: LayoutPreset) -> Vec<PanelId> {
        let mut panels = Vec::with_capacity(preset.panel_count());
        for (z, rect) in preset.geometries().iter().enumerate() {
            panels.push(Panel {
                id: self.allocate_id(),
                rect: *rect,
                z_index: z as i32,
                image: PanelImage::Empty,
            });
        }
        let ids = panels.iter().map(|p| p.id).collect();
        self.panels = panels;
        self.selected = None;
        info!(layout = %preset, "layout applied");
        ids
    }

    /// Removes a panel; returns whether it existed
    pub fn delete_panel(&mut self, id: PanelId) -> bool {
        let before = self.panels.len();
        self.panels.retain(|p| p.id != id);
        let removed = self.panels.len() != before;
        if removed {
            if self.selected == Some(id) {
                self.selected = None;
            }
            debug!(%id, "panel deleted");
        }
        removed
    }

    pub fn delete_selected(&mut self) -> Option<PanelId> {
        let id = self.selected?;
        self.delete_panel(id).then_some(id)
    }

    /// Moves a panel strictly above (or below) every other panel.
    ///
    /// Returns the new z-index, or `None` if the panel does not exist.
    pub fn set_z_order(&mut self, id: PanelId, direction: ZOrder) -> Option<i32> {
        if !self.contains(id) {
            return None;
        }
        let values = self.panels.iter().map(|p| p.z_index);
        let z_index = match direction {
            ZOrder::Front => values.max()? + 1,
            ZOrder::Back => values.min()? - 1,
        };
        let panel = self.get_mut(id)?;
        panel.z_index = z_index;
        Some(z_index)
    }

    pub fn bring_selected_to_front(&mut self) -> Option<i32> {
        self.set_z_order(self.selected?, ZOrder::Front)
    }

    pub fn send_selected_to_back(&mut self) -> Option<i32> {
        self.set_z_order(self.selected?, ZOrder::Back)
    }

    /// Selects a panel; unknown ids leave the selection untouched
    pub fn select(&mut self, id: PanelId) -> bool {
        if self.contains(id) {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Routes a thumbnail click: fill the selected placeholder, otherwise add a panel
    pub fn use_asset(&mut self, asset: Asset) -> AssetPlacement {
        if let Some(panel) = self.selected.and_then(|id| self.get_mut(id)) {
            if panel.is_placeholder() {
                debug!(id = %panel.id, asset = %asset.id, "placeholder filled");
                panel.image = PanelImage::Filled(asset);
                return AssetPlacement::FilledPlaceholder(panel.id);
            }
        }
        AssetPlacement::Added(self.add_panel(asset))
    }

    /// Panels in drawing order: ascending z, ties by insertion order
    pub fn draw_order(&self) -> Vec<&Panel> {
        let mut ordered: Vec<&Panel> = self.panels.iter().collect();
        ordered.sort_by_key(|p| p.z_index);
        ordered
    }

    /// Finds what lies under `point` (page percentages).
    ///
    /// The resize handle exists only on the selected panel, centred on its
    /// bottom-right corner with half-extent `handle_extent`.
    pub fn hit_test(&self, point: Point, handle_extent: Point) -> Option<Hit> {
        if let Some(panel) = self.selected_panel() {
            let on_handle = (point.x - panel.rect.right()).abs() <= handle_extent.x &&
                (point.y - panel.rect.bottom()).abs() <= handle_extent.y;
            if on_handle {
                return Some(Hit { panel: panel.id, target: HitTarget::ResizeHandle });
            }
        }

        self.draw_order()
            .into_iter()
            .rev()
            .find(|p| p.rect.contains(point))
            .map(|p| Hit { panel: p.id, target: HitTarget::Body })
    }
}
