//! Interaction controller: turns pointer gestures into panel geometry updates

use tracing::{debug, info, warn};

use crate::asset::Asset;
use crate::error::{StudioError, StudioResult};
use crate::geometry::{ContainerBounds, Point};
use crate::layout::LayoutPreset;
use crate::model::{AssetPlacement, HitTarget, PageModel, PanelId, ZOrder};

/// Kind of gesture started by a pointer-down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize,
}

impl From<HitTarget> for GestureKind {
    fn from(target: HitTarget) -> Self {
        match target {
            HitTarget::Body => GestureKind::Drag,
            HitTarget::ResizeHandle => GestureKind::Resize,
        }
    }
}

/// The at-most-one live gesture
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging {
        panel: PanelId,
        anchor: Point,
    },
    Resizing {
        panel: PanelId,
        anchor: Point,
        /// Pixel size of the panel when the gesture started
        origin_size: (f64, f64),
        /// Pointer travel since the gesture started
        travel: (f64, f64),
    },
}

impl InteractionState {
    pub fn is_active(&self) -> bool {
        !matches!(self, InteractionState::Idle)
    }

    pub fn target(&self) -> Option<PanelId> {
        match self {
            InteractionState::Idle => None,
            InteractionState::Dragging { panel, .. } | InteractionState::Resizing { panel, .. } => Some(*panel),
        }
    }
}

/// Editor for one page: owns the panel model and the gesture state machine.
///
/// All model mutations go through here so a gesture can never outlive its
/// target panel.
#[derive(Debug, Default)]
pub struct PageEditor {
    model: PageModel,
    state: InteractionState,
}

impl PageEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> &PageModel {
        &self.model
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn into_model(self) -> PageModel {
        self.model
    }

    /// Starts a drag or resize on `panel`.
    ///
    /// The panel is selected and raised to the front. Any gesture still live
    /// is ended first.
    pub fn pointer_down(
        &mut self,
        panel: PanelId,
        kind: GestureKind,
        pointer: Point,
        container: ContainerBounds,
    ) -> StudioResult<()> {
        let rect = self
            .model
            .get(panel)
            .map(|p| p.rect)
            .ok_or(StudioError::PanelNotFound(panel))?;

        if self.state.is_active() {
            warn!(previous = ?self.state.target(), "pointer-down during live gesture, ending it");
            self.state = InteractionState::Idle;
        }

        self.model.select(panel);
        self.model.set_z_order(panel, ZOrder::Front);

        self.state = match kind {
            GestureKind::Drag => InteractionState::Dragging { panel, anchor: pointer },
            GestureKind::Resize => InteractionState::Resizing {
                panel,
                anchor: pointer,
                origin_size: rect.pixel_size(container),
                travel: (0.0, 0.0),
            },
        };
        debug!(%panel, ?kind, "gesture started");
        Ok(())
    }

    /// Hit-tests `pointer` (container pixels) and starts the matching gesture.
    ///
    /// Returns the panel hit, or `None` when the pointer is over empty page.
    pub fn pointer_down_at(
        &mut self,
        pointer: Point,
        container: ContainerBounds,
        handle_extent: Point,
    ) -> StudioResult<Option<PanelId>> {
        if !container.is_usable() {
            return Ok(None);
        }
        let Some(hit) = self.model.hit_test(container.to_percent(pointer), handle_extent) else {
            return Ok(None);
        };
        self.pointer_down(hit.panel, hit.target.into(), pointer, container)?;
        Ok(Some(hit.panel))
    }

    /// Applies an incremental pointer move. Returns true if geometry changed.
    pub fn pointer_move(&mut self, pointer: Point, container: ContainerBounds) -> bool {
        if !self.state.is_active() {
            return false;
        }
        if !container.is_usable() {
            return false;
        }
        let Some(target) = self.state.target() else {
            return false;
        };
        let Some(panel) = self.model.get_mut(target) else {
            warn!(%target, "gesture target vanished, cancelling");
            self.state = InteractionState::Idle;
            return false;
        };

        match &mut self.state {
            InteractionState::Idle => false,
            InteractionState::Dragging { anchor, .. } => {
                let (dx, dy) = pointer.delta_from(*anchor);
                panel.rect = panel.rect.translated(
                    dx / container.width * 100.0,
                    dy / container.height * 100.0,
                );
                *anchor = pointer;
                dx != 0.0 || dy != 0.0
            }
            InteractionState::Resizing { anchor, origin_size, travel, .. } => {
                let (dx, dy) = pointer.delta_from(*anchor);
                travel.0 += dx;
                travel.1 += dy;
                panel.rect = panel.rect.with_size(
                    (origin_size.0 + travel.0) / container.width * 100.0,
                    (origin_size.1 + travel.1) / container.height * 100.0,
                );
                *anchor = pointer;
                dx != 0.0 || dy != 0.0
            }
        }
    }

    /// Ends the live gesture; no-op when idle
    pub fn pointer_up(&mut self) -> Option<PanelId> {
        let ended = self.state.target();
        if let Some(panel) = ended {
            debug!(%panel, "gesture ended");
        }
        self.state = InteractionState::Idle;
        ended
    }

    /// Drops any live gesture without further updates (teardown)
    pub fn cancel_gesture(&mut self) {
        if let Some(panel) = self.state.target() {
            debug!(%panel, "gesture cancelled");
        }
        self.state = InteractionState::Idle;
    }

    /// Plain click: select without touching geometry
    pub fn select(&mut self, panel: PanelId) -> bool {
        self.model.select(panel)
    }

    pub fn clear_selection(&mut self) {
        self.model.clear_selection();
    }

    pub fn add_panel(&mut self, asset: Asset) -> PanelId {
        self.model.add_panel(asset)
    }

    pub fn use_asset(&mut self, asset: Asset) -> AssetPlacement {
        self.model.use_asset(asset)
    }

    /// Replaces all panels, so any live gesture is cancelled
    pub fn apply_layout(&mut self, preset: LayoutPreset) -> Vec<PanelId> {
        self.cancel_gesture();
        self.model.apply_layout(preset)
    }

    /// Deletes a panel, cancelling the live gesture if it targets that panel
    pub fn delete_panel(&mut self, panel: PanelId) -> bool {
        if self.state.target() == Some(panel) {
            info!(%panel, "deleting panel under live gesture");
            self.cancel_gesture();
        }
        self.model.delete_panel(panel)
    }

    pub fn delete_selected(&mut self) -> Option<PanelId> {
        let panel = self.model.selected()?;
        self.delete_panel(panel).then_some(panel)
    }

    pub fn set_z_order(&mut self, panel: PanelId, direction: ZOrder) -> Option<i32> {
        self.model.set_z_order(panel, direction)
    }

    pub fn bring_selected_to_front(&mut self) -> Option<i32> {
        self.model.bring_selected_to_front()
    }

    pub fn send_selected_to_back(&mut self) -> Option<i32> {
        self.model.send_selected_to_back()
    }
}
