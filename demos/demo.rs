//! Page Studio - compositore di pagine a fumetto nel terminale
//!
//! Comandi:
//! - click su un asset della barra laterale (o tasti 1-9): riempie il segnaposto selezionato o aggiunge un pannello
//! - trascina un pannello per spostarlo, trascina la maniglia `#` per ridimensionarlo
//! - v / t / g: preset 2-panel-vertical, 3-panel-vertical, 4-grid
//! - f / b: porta in primo piano / manda in fondo
//! - d o Canc: elimina il pannello selezionato
//! - e: esporta la pagina in JPEG, s: salva la libreria dei pannelli
//! - k: attiva/disattiva la chiave API personale (salvata nel file delle impostazioni)
//! - q / Esc: esci

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use comic_page_studio::asset::encode_payload;
use comic_page_studio::preview::{Color, PagePreview, PreviewCanvas, Rect};
use comic_page_studio::terminal::{PointerAction, StudioEvent, TerminalSession};
use comic_page_studio::{
    page_aspect_ratio, AssetLibrary, AssetPlacement, LayoutPreset, LibraryKind, PageEditor,
    PageRasterizer, SettingsStore, StudioResult,
};
use crossterm::event::KeyCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const SIDEBAR_WIDTH: usize = 28;

#[derive(Parser, Debug)]
#[command(name = "page-studio", about = "Compose comic pages from panel images in the terminal")]
struct Args {
    /// Panel library JSON to load
    #[arg(long)]
    library: Option<PathBuf>,
    /// Character library JSON to load
    #[arg(long)]
    characters: Option<PathBuf>,
    /// Scene library JSON to load
    #[arg(long)]
    scenes: Option<PathBuf>,
    /// Preset to start from: 2-panel-vertical, 3-panel-vertical or 4-grid
    #[arg(long)]
    layout: Option<LayoutPreset>,
    /// Image files to upload into the panel library
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    /// Directory for exported pages and libraries
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// API settings file
    #[arg(long, default_value = "page-studio-settings.json")]
    settings: PathBuf,
    #[arg(long, default_value = "page-studio.log")]
    log_file: PathBuf,
}

/// Riga cliccabile della barra laterale
#[derive(Debug, Clone, Copy)]
struct SidebarEntry {
    row: usize,
    kind: LibraryKind,
    index: usize,
}

struct PageStudio {
    editor: PageEditor,
    libraries: [AssetLibrary; 3],
    rasterizer: PageRasterizer,
    preview: PagePreview,
    last_frame: Option<PreviewCanvas>,
    sidebar: Vec<SidebarEntry>,
    page_area: Rect,
    out_dir: PathBuf,
    settings: SettingsStore,
    status: String,
    dirty: bool,
    running: bool,
}

impl PageStudio {
    fn new(args: &Args) -> Self {
        let mut studio = Self {
            editor: PageEditor::new(),
            libraries: [
                AssetLibrary::new(LibraryKind::Characters),
                AssetLibrary::new(LibraryKind::Scenes),
                AssetLibrary::new(LibraryKind::Panels),
            ],
            rasterizer: PageRasterizer::default(),
            preview: PagePreview::new(),
            last_frame: None,
            sidebar: Vec::new(),
            page_area: Rect::default(),
            out_dir: args.out_dir.clone(),
            settings: SettingsStore::new(&args.settings),
            status: String::from("Ready"),
            dirty: true,
            running: true,
        };

        let sources = [
            (0, args.characters.as_deref()),
            (1, args.scenes.as_deref()),
            (2, args.library.as_deref()),
        ];
        for (slot, path) in sources {
            if let Some(path) = path {
                studio.import_library(slot, path);
            }
        }
        for path in &args.images {
            studio.upload_image(path);
        }
        if let Some(preset) = args.layout {
            studio.apply_layout(preset);
        }
        studio
    }

    fn import_library(&mut self, slot: usize, path: &Path) {
        let library = &mut self.libraries[slot];
        match library.import_file(path) {
            Ok(count) => {
                self.status = format!("Loaded {count} {} assets", library.kind());
                self.preview.clear_cache();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot load library");
                self.status = format!("Invalid file format: {err}");
            }
        }
    }

    fn upload_image(&mut self, path: &Path) {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let result = fs::read(path)
            .map_err(Into::into)
            .and_then(|bytes| self.libraries[2].upload(&encode_payload(&bytes), &file_name, None).map(|_| ()));
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "upload failed");
            self.status = format!("Upload failed: {err}");
        }
    }

    fn layout(&mut self, width: usize, height: usize) {
        let avail_w = width.saturating_sub(SIDEBAR_WIDTH + 2).max(1);
        let avail_h = height.saturating_sub(2).max(1);
        // Le celle del terminale sono alte circa il doppio della larghezza
        let cell_aspect = page_aspect_ratio() * 2.0;
        let mut page_h = avail_h;
        let mut page_w = (page_h as f64 * cell_aspect).round() as usize;
        if page_w > avail_w {
            page_w = avail_w;
            page_h = ((page_w as f64 / cell_aspect).round() as usize).clamp(1, avail_h);
        }
        let x = SIDEBAR_WIDTH + 1 + (avail_w - page_w.min(avail_w)) / 2;
        self.page_area = Rect::new(x, 1, page_w.max(1), page_h);
        self.dirty = true;
    }

    fn use_entry(&mut self, entry: SidebarEntry) {
        let slot = match entry.kind {
            LibraryKind::Characters => 0,
            LibraryKind::Scenes => 1,
            LibraryKind::Panels => 2,
        };
        let Some(asset) = self.libraries[slot].assets().get(entry.index).cloned() else {
            return;
        };
        let label = asset.label().to_string();
        self.status = match self.editor.use_asset(asset) {
            AssetPlacement::FilledPlaceholder(id) => format!("{label} placed into {id}"),
            AssetPlacement::Added(id) => format!("{label} added as {id}"),
        };
    }

    fn export_page(&mut self) {
        match self.rasterizer.export(self.editor.model().panels(), &self.out_dir) {
            Ok(path) => self.status = format!("Exported {}", path.display()),
            Err(err) => {
                error!(error = %err, "export failed");
                self.status = format!("Failed to export the page: {err}");
            }
        }
    }

    fn save_panel_library(&mut self) {
        self.status = match self.libraries[2].export_to_dir(&self.out_dir) {
            Ok(path) => format!("Saved {}", path.display()),
            Err(err) => err.to_string(),
        };
    }

    fn toggle_custom_key(&mut self) {
        self.status = match self.settings.update(|s| s.use_custom_key = !s.use_custom_key) {
            Ok(settings) if settings.use_custom_key && settings.effective_api_key().is_none() => {
                String::from("Custom API key enabled, but no key is set")
            }
            Ok(settings) if settings.use_custom_key => String::from("Using custom API key"),
            Ok(_) => String::from("Using default API key"),
            Err(err) => {
                warn!(error = %err, "cannot save settings");
                format!("Cannot save settings: {err}")
            }
        };
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('v') => self.apply_layout(LayoutPreset::TwoPanelVertical),
            KeyCode::Char('t') => self.apply_layout(LayoutPreset::ThreePanelVertical),
            KeyCode::Char('g') => self.apply_layout(LayoutPreset::FourGrid),
            KeyCode::Char('d') | KeyCode::Delete => {
                self.status = match self.editor.delete_selected() {
                    Some(id) => format!("Deleted {id}"),
                    None => String::from("No panel selected"),
                };
            }
            KeyCode::Char('f') => {
                self.editor.bring_selected_to_front();
            }
            KeyCode::Char('b') => {
                self.editor.send_selected_to_back();
            }
            KeyCode::Char('e') => self.export_page(),
            KeyCode::Char('s') => self.save_panel_library(),
            KeyCode::Char('k') => self.toggle_custom_key(),
            KeyCode::Char(ch @ '1'..='9') => {
                let nth = ch as usize - '1' as usize;
                if let Some(entry) = self.sidebar.get(nth).copied() {
                    self.use_entry(entry);
                }
            }
            _ => return,
        }
        self.dirty = true;
    }

    fn apply_layout(&mut self, preset: LayoutPreset) {
        let ids = self.editor.apply_layout(preset);
        self.status = format!("Layout {preset}: {} placeholders", ids.len());
    }

    fn handle_pointer(&mut self, column: usize, row: usize, action: PointerAction) {
        let area = self.page_area;
        match action {
            PointerAction::Down => {
                if let Some(entry) = self.sidebar.iter().find(|e| e.row == row && column < SIDEBAR_WIDTH).copied() {
                    self.use_entry(entry);
                } else if area.contains(column, row) {
                    let hit = self.editor.pointer_down_at(
                        area.local_point(column, row),
                        area.as_container(),
                        area.cell_extent(),
                    );
                    match hit {
                        Ok(Some(_)) => {}
                        Ok(None) => self.editor.clear_selection(),
                        Err(err) => self.status = err.to_string(),
                    }
                }
            }
            PointerAction::Drag => {
                if !self.editor.pointer_move(area.local_point(column, row), area.as_container()) {
                    return;
                }
            }
            PointerAction::Up => {
                self.editor.pointer_up();
            }
            PointerAction::Moved => return,
        }
        self.dirty = true;
    }

    fn draw_sidebar(&mut self, canvas: &mut PreviewCanvas) {
        self.sidebar.clear();
        let mut row = 1;
        for library in &self.libraries {
            let kind = library.kind();
            let header = match kind.capacity() {
                Some(cap) => format!("{kind}s {}/{cap}", library.len()),
                None => format!("{kind}s {}", library.len()),
            };
            canvas.draw_text(1, row, &header, SIDEBAR_WIDTH - 2, Some(Color::Yellow), None);
            row += 1;
            for (index, asset) in library.assets().iter().enumerate() {
                if row + 1 >= canvas.height {
                    return;
                }
                let hotkey = match self.sidebar.len() {
                    n @ 0..=8 => char::from(b'1' + n as u8),
                    _ => ' ',
                };
                canvas.draw_text(2, row, &format!("{hotkey} {}", asset.label()), SIDEBAR_WIDTH - 3, Some(Color::White), None);
                self.sidebar.push(SidebarEntry { row, kind, index });
                row += 1;
            }
            row += 1;
        }
    }

    fn render(&mut self, session: &TerminalSession) -> StudioResult<()> {
        let (width, height) = session.size();
        let (width, height) = (width as usize, height as usize);
        let mut canvas = PreviewCanvas::new_pooled(width, height);

        let help = "v/t/g layout  f/b z-order  d delete  e export  s save  k api key  q quit";
        canvas.draw_text(0, 0, help, width, Some(Color::Black), Some(Color::White));
        self.draw_sidebar(&mut canvas);
        self.preview.draw(&mut canvas, self.editor.model(), self.page_area);

        let selection = match self.editor.model().selected_panel() {
            Some(panel) => format!(
                "{} at ({:.0}, {:.0}) {:.0}x{:.0} z={}",
                panel.id, panel.rect.x, panel.rect.y, panel.rect.width, panel.rect.height, panel.z_index
            ),
            None => String::from("nothing selected"),
        };
        let status = format!("{}  |  {}", self.status, selection);
        canvas.draw_text(0, height.saturating_sub(1), &status, width, Some(Color::White), Some(Color::Blue));

        session.present(&canvas.render_diff(self.last_frame.as_ref()))?;
        if let Some(old) = self.last_frame.replace(canvas) {
            old.release_to_pool();
        }
        self.dirty = false;
        Ok(())
    }

    fn run(&mut self, session: &mut TerminalSession) -> StudioResult<()> {
        let (width, height) = session.size();
        self.layout(width as usize, height as usize);

        while self.running {
            if let Some(event) = session.poll_event(Duration::from_millis(30))? {
                match event {
                    StudioEvent::Quit => self.running = false,
                    StudioEvent::Key(code) => self.handle_key(code),
                    StudioEvent::Pointer { column, row, action } => {
                        self.handle_pointer(column as usize, row as usize, action)
                    }
                    StudioEvent::Resize { width, height } => {
                        // Ridisegno completo: le dimensioni del canvas cambiano
                        self.editor.cancel_gesture();
                        self.last_frame = None;
                        session.clear()?;
                        self.layout(width as usize, height as usize);
                    }
                }
            }
            if self.dirty {
                self.render(session)?;
            }
        }

        self.editor.cancel_gesture();
        Ok(())
    }
}

fn init_logging(path: &Path) -> StudioResult<()> {
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> StudioResult<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let settings = SettingsStore::new(&args.settings).load();
    info!(custom_key = settings.effective_api_key().is_some(), "page studio starting");

    let mut studio = PageStudio::new(&args);
    let mut session = TerminalSession::new()?;
    let result = studio.run(&mut session);
    drop(session);

    if let Err(err) = &result {
        error!(error = %err, "page studio stopped");
    }
    info!(panels = studio.editor.model().len(), "page studio closed");
    result
}
