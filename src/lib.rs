//! Libreria per comporre pagine di fumetto a partire da pannelli illustrati.
//! Fornisce:
//! - Modello della pagina con pannelli posizionati in percentuale e preset di layout
//! - Controller delle interazioni (trascinamento e ridimensionamento)
//! - Rasterizzazione della pagina a risoluzione di stampa ed export JPEG
//! - Librerie di asset (personaggi, scene, pannelli) con import/export JSON
//! - Impostazioni della chiave API
//! - Anteprima della pagina in terminale con caratteri Braille

pub mod asset;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod layout;
pub mod library;
pub mod model;
pub mod preview;
pub mod raster;
pub mod settings;
pub mod terminal;

pub use asset::{Asset, PanelImage};
pub use error::{StudioError, StudioResult};
pub use geometry::{ContainerBounds, PercentRect, Point};
pub use interaction::{GestureKind, InteractionState, PageEditor};
pub use layout::LayoutPreset;
pub use library::{AssetLibrary, LibraryKind};
pub use model::{AssetPlacement, PageModel, Panel, PanelId, ZOrder};
pub use raster::{PageRasterizer, RasterConfig};
pub use settings::{ApiSettings, SettingsStore};

/// Larghezza della pagina esportata in pixel
pub const PAGE_EXPORT_WIDTH: u32 = 1988;

/// Altezza della pagina esportata in pixel
pub const PAGE_EXPORT_HEIGHT: u32 = 3075;

/// Dimensione minima di un pannello (percentuale della pagina) durante il resize
pub const MIN_PANEL_PERCENT: f64 = 5.0;

/// Geometria di un pannello aggiunto liberamente
pub const DEFAULT_PANEL_GEOMETRY: PercentRect = PercentRect::new(25.0, 25.0, 50.0, 30.0);

/// Rapporto larghezza/altezza della pagina
pub fn page_aspect_ratio() -> f64 {
    PAGE_EXPORT_WIDTH as f64 / PAGE_EXPORT_HEIGHT as f64
}
