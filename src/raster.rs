//! Rasterizzazione della pagina ed export JPEG

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{StudioError, StudioResult};
use crate::geometry::PixelRect;
use crate::model::Panel;
use crate::{PAGE_EXPORT_HEIGHT, PAGE_EXPORT_WIDTH};

/// Limite oltre il quale la superficie di disegno non viene allocata
pub const MAX_SURFACE_PIXELS: u64 = 64 * 1024 * 1024;

/// Parametri della superficie di output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterConfig {
    pub width: u32,
    pub height: u32,
    pub background: Rgb<u8>,
    pub jpeg_quality: u8,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: PAGE_EXPORT_WIDTH,
            height: PAGE_EXPORT_HEIGHT,
            background: Rgb([255, 255, 255]),
            jpeg_quality: 90,
        }
    }
}

/// Appiattisce i pannelli della pagina in un'unica immagine
#[derive(Debug, Clone, Default)]
pub struct PageRasterizer {
    config: RasterConfig,
}

impl PageRasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    fn create_surface(&self) -> StudioResult<RgbaImage> {
        let RasterConfig { width, height, background, .. } = self.config;
        if width == 0 || height == 0 || width as u64 * height as u64 > MAX_SURFACE_PIXELS {
            return Err(StudioError::SurfaceUnavailable { width, height });
        }
        let Rgb([r, g, b]) = background;
        Ok(RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])))
    }

    /// Disegna i pannelli in ordine di z crescente (a parità, ordine di inserimento).
    ///
    /// Ogni immagine viene stirata per riempire esattamente il rettangolo del
    /// pannello. I segnaposto e le immagini non decodificabili vengono saltati.
    pub fn rasterize(&self, panels: &[Panel]) -> StudioResult<RgbImage> {
        let mut surface = self.create_surface()?;
        let (width, height) = surface.dimensions();

        let mut ordered: Vec<&Panel> = panels.iter().collect();
        ordered.sort_by_key(|p| p.z_index);

        for panel in ordered {
            let Some(asset) = panel.image.asset() else {
                continue;
            };
            let target = panel.rect.to_pixels(width, height);
            let Some(visible) = target.clip_to(width, height) else {
                debug!(id = %panel.id, "panel outside page, skipped");
                continue;
            };

            // Decodifica sequenziale: l'ordine di disegno conta più della velocità
            let decoded = match asset.decode() {
                Ok(img) => img.to_rgba8(),
                Err(err) => {
                    warn!(id = %panel.id, prompt = %asset.prompt, error = %err, "failed to load image for export");
                    continue;
                }
            };

            let (sx, sy, sw, sh) = source_window(decoded.dimensions(), target, visible);
            let source = imageops::crop_imm(&decoded, sx, sy, sw, sh).to_image();
            let stretched = imageops::resize(&source, visible.width, visible.height, FilterType::Triangle);
            imageops::overlay(&mut surface, &stretched, visible.x, visible.y);
        }

        Ok(DynamicImage::ImageRgba8(surface).to_rgb8())
    }

    /// Codifica la superficie in JPEG con la qualità configurata
    pub fn encode_jpeg(&self, image: &RgbImage) -> StudioResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, self.config.jpeg_quality);
        encoder
            .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
            .map_err(|err| StudioError::Encode(err.to_string()))?;
        Ok(out)
    }

    /// Rasterizza e codifica; nessun byte viene prodotto se un passo fallisce
    pub fn render_jpeg(&self, panels: &[Panel]) -> StudioResult<Vec<u8>> {
        let page = self.rasterize(panels)?;
        self.encode_jpeg(&page)
    }

    /// Esporta la pagina in `dir` come `comic-page-<timestamp>.jpeg`
    pub fn export(&self, panels: &[Panel], dir: &Path) -> StudioResult<PathBuf> {
        info!(panels = panels.len(), "exporting page");
        let bytes = self.render_jpeg(panels)?;
        let path = dir.join(export_file_name(unix_millis()));
        // Scrittura su file temporaneo nella stessa cartella, poi rename atomico
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|err| err.error)?;
        info!(path = %path.display(), bytes = bytes.len(), "page exported");
        Ok(path)
    }
}

/// Porzione dell'immagine sorgente che finisce nella parte visibile del pannello.
///
/// Si ricampiona solo ciò che sta sulla pagina: un pannello molto più grande
/// della pagina non alloca mai più della superficie stessa.
fn source_window(source: (u32, u32), target: PixelRect, visible: PixelRect) -> (u32, u32, u32, u32) {
    let axis = |src: u32, t_pos: i64, t_len: u32, v_pos: i64, v_len: u32| -> (u32, u32) {
        let scale = src as f64 / t_len.max(1) as f64;
        let offset = (v_pos - t_pos) as f64;
        let start = ((offset * scale).floor() as u32).min(src.saturating_sub(1));
        let end = (((offset + v_len as f64) * scale).ceil() as u32).clamp(start + 1, src.max(1));
        (start, end - start)
    };
    let (sx, sw) = axis(source.0, target.x, target.width, visible.x, visible.width);
    let (sy, sh) = axis(source.1, target.y, target.height, visible.y, visible.height);
    (sx, sy, sw, sh)
}

/// Nome del file di export per un dato timestamp in millisecondi
pub fn export_file_name(timestamp_millis: u128) -> String {
    format!("comic-page-{timestamp_millis}.jpeg")
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{encode_payload, Asset, PanelImage};
    use crate::geometry::PercentRect;
    use crate::model::PageModel;
    use image::ImageOutputFormat;
    use std::io::Cursor;

    fn solid_asset(id: &str, color: [u8; 3]) -> Asset {
        let img = RgbImage::from_pixel(8, 8, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        Asset::new(id, id, encode_payload(&out.into_inner()))
    }

    fn small() -> PageRasterizer {
        PageRasterizer::new(RasterConfig { width: 100, height: 200, ..RasterConfig::default() })
    }

    #[test]
    fn test_default_config_is_print_page() {
        let config = RasterConfig::default();
        assert_eq!((config.width, config.height), (1988, 3075));
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.background, Rgb([255, 255, 255]));
    }

    #[test]
    fn test_empty_page_is_background() {
        let page = small().rasterize(&[]).unwrap();
        assert_eq!(page.dimensions(), (100, 200));
        assert!(page.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_surface_unavailable() {
        let raster = PageRasterizer::new(RasterConfig { width: 0, height: 10, ..RasterConfig::default() });
        assert!(matches!(
            raster.rasterize(&[]),
            Err(StudioError::SurfaceUnavailable { width: 0, height: 10 })
        ));
        assert!(raster.render_jpeg(&[]).is_err());
    }

    #[test]
    fn test_higher_z_wins_on_overlap() {
        let mut model = PageModel::new();
        model.add_panel(solid_asset("red", [255, 0, 0]));
        model.add_panel(solid_asset("green", [0, 255, 0]));
        model.add_panel(solid_asset("blue", [0, 0, 255]));
        // z by index: [2, 0, 1]
        let mut panels = model.panels().to_vec();
        panels[0].z_index = 2;
        panels[1].z_index = 0;
        panels[2].z_index = 1;
        for p in &mut panels {
            p.rect = PercentRect::new(10.0, 10.0, 50.0, 50.0);
        }
        let page = small().rasterize(&panels).unwrap();
        assert_eq!(page.get_pixel(30, 60), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_equal_z_keeps_insertion_order() {
        let mut model = PageModel::new();
        model.add_panel(solid_asset("red", [255, 0, 0]));
        model.add_panel(solid_asset("blue", [0, 0, 255]));
        let mut panels = model.panels().to_vec();
        for p in &mut panels {
            p.z_index = 4;
        }
        let page = small().rasterize(&panels).unwrap();
        assert_eq!(page.get_pixel(50, 100), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_stretch_fills_rect_and_skips_placeholders() {
        let mut model = PageModel::new();
        let ids = model.apply_layout(crate::layout::LayoutPreset::TwoPanelVertical);
        model.select(ids[0]);
        model.use_asset(solid_asset("scene", [0, 0, 255]));
        let page = small().rasterize(model.panels()).unwrap();
        // top rect: x 5..95, y 10..98
        assert_eq!(page.get_pixel(6, 11), &Rgb([0, 0, 255]));
        assert_eq!(page.get_pixel(93, 96), &Rgb([0, 0, 255]));
        assert_eq!(page.get_pixel(2, 50), &Rgb([255, 255, 255]));
        // bottom placeholder stays blank
        assert_eq!(page.get_pixel(50, 150), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_decode_failure_skips_panel() {
        let mut model = PageModel::new();
        model.add_panel(solid_asset("good", [0, 255, 0]));
        let mut panels = model.panels().to_vec();
        panels.push(crate::model::Panel {
            image: PanelImage::Filled(Asset::new("bad", "bad", "%%%")),
            z_index: 9,
            ..panels[0].clone()
        });
        let page = small().rasterize(&panels).unwrap();
        assert_eq!(page.get_pixel(50, 100), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_offpage_panel_is_clipped() {
        let mut model = PageModel::new();
        model.add_panel(solid_asset("red", [255, 0, 0]));
        let mut panels = model.panels().to_vec();
        panels[0].rect = PercentRect::new(-20.0, -10.0, 40.0, 20.0);
        let page = small().rasterize(&panels).unwrap();
        assert_eq!(page.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(25, 25), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_oversized_panel_resamples_only_visible_part() {
        let mut model = PageModel::new();
        model.add_panel(solid_asset("red", [255, 0, 0]));
        let mut panels = model.panels().to_vec();
        panels[0].rect = PercentRect::new(10.0, 10.0, 1e6, 1e6);
        let page = small().rasterize(&panels).unwrap();
        assert_eq!(page.get_pixel(50, 100), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(5, 5), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_resize_far_past_page_still_exports() {
        use crate::geometry::{ContainerBounds, Point};
        use crate::interaction::{GestureKind, PageEditor};

        let container = ContainerBounds::new(400.0, 600.0);
        let mut editor = PageEditor::new();
        let id = editor.add_panel(solid_asset("red", [255, 0, 0]));
        editor.pointer_down(id, GestureKind::Resize, Point::new(0.0, 0.0), container).unwrap();
        editor.pointer_move(Point::new(1e12, 1e12), container);
        editor.pointer_up();
        assert!(editor.model().get(id).unwrap().rect.width > 1e9);

        let page = small().rasterize(editor.model().panels()).unwrap();
        assert_eq!(page.get_pixel(99, 199), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert!(small().render_jpeg(editor.model().panels()).is_ok());
    }

    #[test]
    fn test_clipped_panel_shows_matching_source_part() {
        // left half red, right half blue
        let img = RgbImage::from_fn(8, 8, |x, _| if x < 4 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, ImageOutputFormat::Png).unwrap();
        let mut model = PageModel::new();
        model.add_panel(Asset::new("split", "split", encode_payload(&out.into_inner())));
        let mut panels = model.panels().to_vec();
        // only the right half lands on the page
        panels[0].rect = PercentRect::new(-100.0, 0.0, 200.0, 100.0);
        let page = small().rasterize(&panels).unwrap();
        assert_eq!(page.get_pixel(50, 100), &Rgb([0, 0, 255]));
        assert_eq!(page.get_pixel(1, 1), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_source_window_maps_visible_region() {
        let target = PixelRect { x: -50, y: 0, width: 100, height: 200 };
        let visible = PixelRect { x: 0, y: 0, width: 50, height: 200 };
        assert_eq!(source_window((10, 20), target, visible), (5, 0, 5, 20));
        let huge = PixelRect { x: 0, y: 0, width: u32::MAX, height: u32::MAX };
        let visible = PixelRect { x: 0, y: 0, width: 100, height: 200 };
        assert_eq!(source_window((8, 8), huge, visible), (0, 0, 1, 1));
    }

    #[test]
    fn test_jpeg_output_decodes() {
        let bytes = small().render_jpeg(&[]).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 200));
    }

    #[test]
    fn test_export_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = small().export(&[], dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("comic-page-") && name.ends_with(".jpeg"));
        assert!(path.exists());
    }

    #[test]
    fn test_failed_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let raster = PageRasterizer::new(RasterConfig { width: 0, height: 0, ..RasterConfig::default() });
        assert!(raster.export(&[], dir.path()).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = small().export(&[], dir.path()).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries, vec![path]);
    }

    #[test]
    fn test_export_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(small().export(&[], &missing), Err(StudioError::Io(_))));
        assert!(!missing.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(1700000000000), "comic-page-1700000000000.jpeg");
    }
}
