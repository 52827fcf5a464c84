//! Anteprima della pagina nel terminale.
//! Fornisce:
//! - Canvas di celle colorate con pool di memoria
//! - Conversione immagini in caratteri Unicode Braille (righe in parallelo)
//! - Disegno dei pannelli in ordine di z con selezione e maniglia di resize
//! - Rendering ANSI incrementale (solo righe cambiate)

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::debug;

use crate::asset::Asset;
use crate::geometry::{ContainerBounds, PercentRect, Point};
use crate::model::PageModel;

/// Colore di una cella
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
    Yellow,
    Blue,
    White,
    Gray,
}

impl Color {
    pub fn to_ansi_fg(&self) -> &'static str {
        match self {
            Color::Black => "\x1b[30m",
            Color::Red => "\x1b[31m",
            Color::Yellow => "\x1b[33m",
            Color::Blue => "\x1b[34m",
            Color::White => "\x1b[37m",
            Color::Gray => "\x1b[90m",
        }
    }

    pub fn to_ansi_bg(&self) -> &'static str {
        match self {
            Color::Black => "\x1b[40m",
            Color::Red => "\x1b[41m",
            Color::Yellow => "\x1b[43m",
            Color::Blue => "\x1b[44m",
            Color::White => "\x1b[47m",
            Color::Gray => "\x1b[100m",
        }
    }
}

/// Carattere con attributi di colore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

impl Cell {
    pub const fn new(ch: char) -> Self {
        Self { ch, fg: None, bg: None }
    }

    pub fn with_fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    pub fn with_bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new(' ')
    }
}

/// Area rettangolare in celle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width &&
        y >= self.y && y < self.y + self.height
    }

    /// Dimensioni come contenitore per il controller delle interazioni
    pub fn as_container(&self) -> ContainerBounds {
        ContainerBounds::new(self.width as f64, self.height as f64)
    }

    /// Posizione di una cella relativa all'angolo dell'area
    pub fn local_point(&self, column: usize, row: usize) -> Point {
        Point::new(
            column as f64 - self.x as f64 + 0.5,
            row as f64 - self.y as f64 + 0.5,
        )
    }

    /// Dimensione di una cella in percentuale dell'area (tolleranza per la maniglia)
    pub fn cell_extent(&self) -> Point {
        Point::new(
            100.0 / self.width.max(1) as f64,
            100.0 / self.height.max(1) as f64,
        )
    }

    /// Proietta un rettangolo percentuale sull'area, tagliando ciò che esce
    pub fn project(&self, rect: &PercentRect) -> Option<Rect> {
        let w = self.width as f64;
        let h = self.height as f64;
        let left = (rect.x / 100.0 * w).round() as i64;
        let top = (rect.y / 100.0 * h).round() as i64;
        let right = (rect.right() / 100.0 * w).round() as i64;
        let bottom = (rect.bottom() / 100.0 * h).round() as i64;

        let x0 = left.clamp(0, self.width as i64);
        let y0 = top.clamp(0, self.height as i64);
        let x1 = right.clamp(0, self.width as i64);
        let y1 = bottom.clamp(0, self.height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(
            self.x + x0 as usize,
            self.y + y0 as usize,
            (x1 - x0) as usize,
            (y1 - y0) as usize,
        ))
    }
}

// Pool globale per riutilizzare i buffer delle celle tra un frame e l'altro
static CELL_POOL: Lazy<Mutex<Vec<Vec<Cell>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Canvas di celle colorate
#[derive(Debug, Clone)]
pub struct PreviewCanvas {
    pub width: usize,
    pub height: usize,
    cells: Vec<Cell>,
}

impl PreviewCanvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width * height],
        }
    }

    /// Crea un canvas riutilizzando un buffer dal pool, se disponibile
    pub fn new_pooled(width: usize, height: usize) -> Self {
        let size = width * height;
        let cells = {
            let mut pool = CELL_POOL.lock();
            match pool.pop() {
                Some(mut reused) => {
                    reused.clear();
                    reused.resize(size, Cell::default());
                    reused
                }
                None => vec![Cell::default(); size],
            }
        };
        Self { width, height, cells }
    }

    /// Rilascia il buffer al pool
    pub fn release_to_pool(mut self) {
        if self.cells.capacity() <= 1024 * 1024 {
            let mut pool = CELL_POOL.lock();
            if pool.len() < 8 {
                self.cells.clear();
                pool.push(self.cells);
            }
        }
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::default()
        }
    }

    pub fn clear_with(&mut self, cell: Cell) {
        self.cells.fill(cell);
    }

    pub fn fill_rect(&mut self, rect: Rect, cell: Cell) {
        let end_x = (rect.x + rect.width).min(self.width);
        let end_y = (rect.y + rect.height).min(self.height);
        for y in rect.y.min(self.height)..end_y {
            for x in rect.x.min(self.width)..end_x {
                self.set(x, y, cell);
            }
        }
    }

    /// Bordo semplice con caratteri ASCII
    pub fn draw_border(&mut self, rect: Rect, color: Color) {
        if rect.width < 2 || rect.height < 2 {
            return;
        }
        let right = rect.x + rect.width - 1;
        let bottom = rect.y + rect.height - 1;
        let bg = self.get(rect.x, rect.y).bg;
        let styled = |ch: char| Cell { ch, fg: Some(color), bg };

        for x in rect.x + 1..right {
            self.set(x, rect.y, styled('-'));
            self.set(x, bottom, styled('-'));
        }
        for y in rect.y + 1..bottom {
            self.set(rect.x, y, styled('|'));
            self.set(right, y, styled('|'));
        }
        for (x, y) in [(rect.x, rect.y), (right, rect.y), (rect.x, bottom), (right, bottom)] {
            self.set(x, y, styled('+'));
        }
    }

    /// Testo troncato alla larghezza disponibile
    pub fn draw_text(&mut self, x: usize, y: usize, text: &str, max_len: usize, fg: Option<Color>, bg: Option<Color>) {
        if y >= self.height {
            return;
        }
        for (i, ch) in text.chars().take(max_len).enumerate() {
            let ch = if ch.is_control() { '?' } else { ch };
            self.set(x + i, y, Cell { ch, fg, bg });
        }
    }

    /// Copia una griglia Braille nell'area indicata
    pub fn blit_braille(&mut self, area: Rect, grid: &BrailleGrid, fg: Color, bg: Color) {
        for row in 0..area.height.min(grid.rows) {
            for col in 0..area.width.min(grid.cols) {
                let cell = Cell::new(grid.get(col, row)).with_fg(fg).with_bg(bg);
                self.set(area.x + col, area.y + row, cell);
            }
        }
    }

    fn push_row(&self, y: usize, out: &mut String) {
        let mut fg: Option<Color> = None;
        let mut bg: Option<Color> = None;
        for x in 0..self.width {
            let cell = self.get(x, y);
            if cell.fg != fg {
                fg = cell.fg;
                out.push_str(fg.map_or("\x1b[39m", |c| c.to_ansi_fg()));
            }
            if cell.bg != bg {
                bg = cell.bg;
                out.push_str(bg.map_or("\x1b[49m", |c| c.to_ansi_bg()));
            }
            out.push(cell.ch);
        }
        out.push_str("\x1b[0m");
    }

    /// Sequenze ANSI per ridisegnare solo le righe diverse da `previous`
    pub fn render_diff(&self, previous: Option<&PreviewCanvas>) -> String {
        let previous = previous.filter(|p| p.width == self.width && p.height == self.height);
        let mut out = String::with_capacity(1024);
        for y in 0..self.height {
            let changed = match previous {
                Some(prev) => (0..self.width).any(|x| self.get(x, y) != prev.get(x, y)),
                None => true,
            };
            if changed {
                out.push_str(&format!("\x1b[{};1H", y + 1));
                self.push_row(y, &mut out);
            }
        }
        out
    }

    /// Solo i caratteri, senza colori (utile nei test e nei log)
    pub fn to_plain_string(&self) -> String {
        let mut out = String::with_capacity(self.width * self.height + self.height);
        for y in 0..self.height {
            out.extend((0..self.width).map(|x| self.get(x, y).ch));
            if y + 1 < self.height {
                out.push('\n');
            }
        }
        out
    }
}

/// Griglia di caratteri Braille (ogni carattere = 2x4 pixel)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrailleGrid {
    pub cols: usize,
    pub rows: usize,
    chars: Vec<char>,
}

impl BrailleGrid {
    pub fn get(&self, col: usize, row: usize) -> char {
        if col < self.cols && row < self.rows {
            self.chars[row * self.cols + col]
        } else {
            ' '
        }
    }
}

/// Converte un blocco 2x4 pixel in un carattere Unicode Braille
fn block_to_braille(block: &[u8; 8], threshold: u8) -> char {
    // Ordine dei punti Braille: [1, 2, 3, 7, 4, 5, 6, 8]
    const DOT_BITS: [u32; 8] = [0, 1, 2, 6, 3, 4, 5, 7];
    let code = block
        .iter()
        .zip(DOT_BITS)
        .filter(|&(&px, _)| px < threshold)
        .fold(0x2800u32, |acc, (_, bit)| acc | (1 << bit));
    char::from_u32(code).unwrap_or(' ')
}

/// Stira l'immagine su `cols` x `rows` caratteri Braille.
///
/// I pixel scuri accendono i punti (inchiostro su carta).
pub fn image_to_braille(img: &DynamicImage, cols: usize, rows: usize, threshold: u8) -> Option<BrailleGrid> {
    luma_to_braille(&img.to_luma8(), cols, rows, threshold)
}

/// Come [`image_to_braille`] ma da un'immagine già in scala di grigi.
/// Le righe di caratteri vengono calcolate in parallelo.
pub fn luma_to_braille(luma: &GrayImage, cols: usize, rows: usize, threshold: u8) -> Option<BrailleGrid> {
    if cols == 0 || rows == 0 || luma.width() == 0 || luma.height() == 0 {
        return None;
    }
    let gray: GrayImage = imageops::resize(
        luma,
        (cols * 2) as u32,
        (rows * 4) as u32,
        FilterType::Triangle,
    );

    let lines: Vec<Vec<char>> = (0..rows)
        .into_par_iter()
        .map(|by| {
            (0..cols)
                .map(|bx| {
                    let mut block = [255u8; 8];
                    for dy in 0..4 {
                        for dx in 0..2 {
                            let px = gray.get_pixel((bx * 2 + dx) as u32, (by * 4 + dy) as u32);
                            block[dx + dy * 2] = px.0[0];
                        }
                    }
                    block_to_braille(&block, threshold)
                })
                .collect()
        })
        .collect();

    Some(BrailleGrid {
        cols,
        rows,
        chars: lines.into_iter().flatten().collect(),
    })
}

/// Numero massimo di asset tenuti in cache
const MAX_THUMBNAILS: usize = 64;

/// Lato massimo della sorgente in scala di grigi conservata per asset
const THUMBNAIL_SOURCE_MAX: u32 = 256;

/// Sorgente decodificata una sola volta, più la griglia per l'ultima dimensione richiesta
#[derive(Debug)]
struct Thumbnail {
    source: Option<GrayImage>,
    grid: Option<BrailleGrid>,
}

// Id importati da librerie diverse possono coincidere: la chiave include il payload
fn thumbnail_key(asset: &Asset) -> (String, u64) {
    let mut hasher = DefaultHasher::new();
    asset.base64.hash(&mut hasher);
    (asset.id.clone(), hasher.finish())
}

fn decode_source(asset: &Asset) -> Option<GrayImage> {
    match asset.decode() {
        Ok(img) => {
            let luma = img.to_luma8();
            let (w, h) = luma.dimensions();
            if w > THUMBNAIL_SOURCE_MAX || h > THUMBNAIL_SOURCE_MAX {
                Some(imageops::resize(
                    &luma,
                    w.min(THUMBNAIL_SOURCE_MAX),
                    h.min(THUMBNAIL_SOURCE_MAX),
                    FilterType::Triangle,
                ))
            } else {
                Some(luma)
            }
        }
        Err(err) => {
            debug!(asset = %asset.id, error = %err, "preview decode failed");
            None
        }
    }
}

/// Disegna il modello della pagina su un canvas, con cache delle miniature
#[derive(Debug, Default)]
pub struct PagePreview {
    thumbnails: HashMap<(String, u64), Thumbnail>,
}

impl PagePreview {
    pub fn new() -> Self {
        Self::default()
    }

    fn thumbnail(&mut self, asset: &Asset, cols: usize, rows: usize) -> Option<&BrailleGrid> {
        let key = thumbnail_key(asset);
        if self.thumbnails.len() >= MAX_THUMBNAILS && !self.thumbnails.contains_key(&key) {
            debug!(entries = self.thumbnails.len(), "thumbnail cache full, clearing");
            self.thumbnails.clear();
        }
        let entry = self.thumbnails.entry(key).or_insert_with(|| Thumbnail {
            source: decode_source(asset),
            grid: None,
        });
        let stale = entry.grid.as_ref().map_or(true, |g| g.cols != cols || g.rows != rows);
        if stale {
            entry.grid = entry
                .source
                .as_ref()
                .and_then(|src| luma_to_braille(src, cols, rows, 128));
        }
        entry.grid.as_ref()
    }

    /// Numero di asset in cache
    pub fn cached_thumbnails(&self) -> usize {
        self.thumbnails.len()
    }

    /// Dimentica le miniature (es. dopo l'import di una libreria)
    pub fn clear_cache(&mut self) {
        self.thumbnails.clear();
    }

    pub fn draw(&mut self, canvas: &mut PreviewCanvas, model: &PageModel, page: Rect) {
        canvas.fill_rect(page, Cell::new(' ').with_bg(Color::White));
        let selected = model.selected();

        for panel in model.draw_order() {
            let Some(area) = page.project(&panel.rect) else {
                continue;
            };
            let is_selected = selected == Some(panel.id);

            match panel.image.asset() {
                Some(asset) => {
                    canvas.fill_rect(area, Cell::new(' ').with_bg(Color::White));
                    match self.thumbnail(asset, area.width, area.height) {
                        Some(grid) => canvas.blit_braille(area, grid, Color::Black, Color::White),
                        None => {
                            // immagine non decodificabile: verrà saltata anche nell'export
                            let label = "broken";
                            let x = area.x + area.width.saturating_sub(label.len()) / 2;
                            canvas.draw_text(x, area.y + area.height / 2, label, area.width, Some(Color::Red), Some(Color::White));
                        }
                    }
                }
                None => {
                    canvas.fill_rect(area, Cell::new(' ').with_bg(Color::Gray));
                    let label = "empty";
                    let x = area.x + area.width.saturating_sub(label.len()) / 2;
                    canvas.draw_text(x, area.y + area.height / 2, label, area.width, Some(Color::White), Some(Color::Gray));
                }
            }

            let border = if is_selected { Color::Blue } else { Color::Black };
            canvas.draw_border(area, border);
            if area.width > 2 {
                let bg = canvas.get(area.x + 1, area.y).bg;
                canvas.draw_text(area.x + 1, area.y, panel.image.label(), area.width - 2, Some(border), bg);
            }
            if is_selected {
                let handle = Cell::new('#').with_fg(Color::White).with_bg(Color::Blue);
                canvas.set(area.x + area.width - 1, area.y + area.height - 1, handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{encode_payload, Asset};
    use crate::layout::LayoutPreset;
    use image::{ImageOutputFormat, Luma};
    use std::io::Cursor;

    #[test]
    fn test_block_to_braille() {
        assert_eq!(block_to_braille(&[255; 8], 128), '\u{2800}');
        assert_eq!(block_to_braille(&[0; 8], 128), '\u{28FF}');
        let mut block = [255u8; 8];
        block[0] = 0;
        assert_eq!(block_to_braille(&block, 128), '\u{2801}');
    }

    #[test]
    fn test_image_to_braille_dimensions() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([0])));
        let grid = image_to_braille(&img, 3, 2, 128).unwrap();
        assert_eq!((grid.cols, grid.rows), (3, 2));
        assert_eq!(grid.get(2, 1), '\u{28FF}');
        assert_eq!(grid.get(5, 5), ' ');
        assert!(image_to_braille(&img, 0, 2, 128).is_none());
    }

    fn luma_asset(id: &str, value: u8) -> Asset {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([value])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        Asset::new(id, id, encode_payload(&out.into_inner()))
    }

    #[test]
    fn test_thumbnails_with_shared_id_stay_distinct() {
        // a character and a scene imported with the same id
        let dark = luma_asset("1", 0);
        let light = luma_asset("1", 255);
        let mut preview = PagePreview::new();
        let dark_grid = preview.thumbnail(&dark, 4, 2).cloned().unwrap();
        let light_grid = preview.thumbnail(&light, 4, 2).cloned().unwrap();
        assert_eq!(dark_grid.get(0, 0), '\u{28FF}');
        assert_eq!(light_grid.get(0, 0), '\u{2800}');
        assert_eq!(preview.cached_thumbnails(), 2);
    }

    #[test]
    fn test_thumbnail_keeps_latest_size_only() {
        let asset = luma_asset("hero", 0);
        let mut preview = PagePreview::new();
        for size in 2..20 {
            let grid = preview.thumbnail(&asset, size, size + 1).unwrap();
            assert_eq!((grid.cols, grid.rows), (size, size + 1));
        }
        assert_eq!(preview.cached_thumbnails(), 1);
        preview.clear_cache();
        assert_eq!(preview.cached_thumbnails(), 0);
    }

    #[test]
    fn test_thumbnail_cache_is_bounded() {
        let mut preview = PagePreview::new();
        for n in 0..MAX_THUMBNAILS + 10 {
            preview.thumbnail(&luma_asset(&format!("a{n}"), 0), 2, 2);
            assert!(preview.cached_thumbnails() <= MAX_THUMBNAILS);
        }
        assert!(preview.thumbnail(&Asset::new("bad", "bad", "%%%"), 2, 2).is_none());
    }

    #[test]
    fn test_undecodable_panel_marked_broken() {
        let mut model = PageModel::new();
        model.add_panel(Asset::new("bad", "bad", "%%%"));
        let mut canvas = PreviewCanvas::new(40, 40);
        PagePreview::new().draw(&mut canvas, &model, Rect::new(0, 0, 40, 40));
        let text = canvas.to_plain_string();
        let row = text.lines().find(|l| l.contains("broken")).unwrap();
        let x = row.chars().position(|c| c == 'b').unwrap();
        let y = text.lines().position(|l| l.contains("broken")).unwrap();
        assert_eq!(canvas.get(x, y).fg, Some(Color::Red));
    }

    #[test]
    fn test_palette_codes_are_distinct() {
        let palette = [Color::Black, Color::Red, Color::Yellow, Color::Blue, Color::White, Color::Gray];
        let fg: std::collections::HashSet<_> = palette.iter().map(|c| c.to_ansi_fg()).collect();
        let bg: std::collections::HashSet<_> = palette.iter().map(|c| c.to_ansi_bg()).collect();
        assert_eq!((fg.len(), bg.len()), (palette.len(), palette.len()));
    }

    #[test]
    fn test_project_clips_to_area() {
        let page = Rect::new(10, 2, 20, 40);
        let inside = page.project(&PercentRect::new(5.0, 5.0, 90.0, 44.0)).unwrap();
        assert_eq!(inside, Rect::new(11, 4, 18, 18));
        let partial = page.project(&PercentRect::new(-50.0, 0.0, 60.0, 10.0)).unwrap();
        assert_eq!(partial, Rect::new(10, 2, 2, 4));
        assert!(page.project(&PercentRect::new(120.0, 0.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn test_pool_reuse() {
        let canvas = PreviewCanvas::new_pooled(4, 4);
        canvas.release_to_pool();
        let reused = PreviewCanvas::new_pooled(2, 3);
        assert_eq!(reused.to_plain_string(), "  \n  \n  ");
    }

    #[test]
    fn test_render_diff_only_changed_rows() {
        let mut a = PreviewCanvas::new(3, 3);
        let b = a.clone();
        a.set(1, 2, Cell::new('x').with_fg(Color::Red));
        let diff = a.render_diff(Some(&b));
        assert!(diff.contains("\x1b[3;1H"));
        assert!(!diff.contains("\x1b[1;1H"));
        assert!(diff.contains("\x1b[31m"));
        assert_eq!(a.render_diff(Some(&a)), "");
    }

    #[test]
    fn test_draw_placeholders_and_selection() {
        let mut model = PageModel::new();
        let ids = model.apply_layout(LayoutPreset::TwoPanelVertical);
        model.select(ids[1]);
        let page = Rect::new(0, 0, 20, 20);
        let mut canvas = PreviewCanvas::new(20, 20);
        PagePreview::new().draw(&mut canvas, &model, page);

        let text = canvas.to_plain_string();
        assert_eq!(text.matches("empty").count(), 2);
        let bottom = page.project(&model.get(ids[1]).unwrap().rect).unwrap();
        let corner = canvas.get(bottom.x + bottom.width - 1, bottom.y + bottom.height - 1);
        assert_eq!(corner.ch, '#');
        assert_eq!(canvas.get(bottom.x + 3, bottom.y).fg, Some(Color::Blue));
    }

    #[test]
    fn test_draw_filled_panel_uses_braille() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([0])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        let mut model = PageModel::new();
        model.add_panel(Asset::new("dark", "dark", encode_payload(&out.into_inner())));

        let page = Rect::new(0, 0, 40, 40);
        let mut canvas = PreviewCanvas::new(40, 40);
        PagePreview::new().draw(&mut canvas, &model, page);
        // centro del pannello (25..75%, 25..55%)
        assert_eq!(canvas.get(20, 16).ch, '\u{28FF}');
    }
}
