//! Geometria della pagina: rettangoli in percentuale e in pixel

use crate::MIN_PANEL_PERCENT;

/// Punto in pixel dello schermo (o del contenitore della pagina)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Differenza `self - origin`
    pub fn delta_from(&self, origin: Point) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }
}

/// Dimensioni in pixel del contenitore su cui è disegnata la pagina
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerBounds {
    pub width: f64,
    pub height: f64,
}

impl ContainerBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Un contenitore degenere non può convertire pixel in percentuali
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Converte un punto in pixel in coordinate percentuali della pagina
    pub fn to_percent(&self, point: Point) -> Point {
        Point::new(point.x / self.width * 100.0, point.y / self.height * 100.0)
    }
}

/// Rettangolo in percentuale delle dimensioni della pagina, origine in alto a sinistra.
///
/// La posizione può uscire dalla pagina (anche negativa) durante un drag;
/// la dimensione invece non scende mai sotto [`MIN_PANEL_PERCENT`] dopo un resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PercentRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() &&
        point.y >= self.y && point.y < self.bottom()
    }

    /// Sovrapposizione con area positiva (i bordi a contatto non contano)
    pub fn overlaps(&self, other: &PercentRect) -> bool {
        self.x < other.right() &&
        self.right() > other.x &&
        self.y < other.bottom() &&
        self.bottom() > other.y
    }

    /// Bounding box di due rettangoli
    pub fn union(&self, other: &PercentRect) -> PercentRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PercentRect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Sposta il rettangolo di un delta espresso in percentuale
    pub fn translated(&self, dx: f64, dy: f64) -> PercentRect {
        PercentRect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Nuova dimensione, con il minimo per asse applicato
    pub fn with_size(&self, width: f64, height: f64) -> PercentRect {
        PercentRect::new(
            self.x,
            self.y,
            width.max(MIN_PANEL_PERCENT),
            height.max(MIN_PANEL_PERCENT),
        )
    }

    /// Dimensione in pixel rispetto a un contenitore
    pub fn pixel_size(&self, container: ContainerBounds) -> (f64, f64) {
        (
            self.width / 100.0 * container.width,
            self.height / 100.0 * container.height,
        )
    }

    /// Proietta il rettangolo su una superficie di `page_width` x `page_height` pixel
    pub fn to_pixels(&self, page_width: u32, page_height: u32) -> PixelRect {
        let w = page_width as f64;
        let h = page_height as f64;
        PixelRect {
            x: (self.x / 100.0 * w).round() as i64,
            y: (self.y / 100.0 * h).round() as i64,
            width: (self.width / 100.0 * w).round().max(0.0) as u32,
            height: (self.height / 100.0 * h).round().max(0.0) as u32,
        }
    }
}

/// Rettangolo in pixel di una superficie di output; può sporgere oltre i bordi
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Vero se il rettangolo cade almeno in parte dentro `surface_w` x `surface_h`
    pub fn intersects_surface(&self, surface_w: u32, surface_h: u32) -> bool {
        !self.is_empty() &&
        self.x < surface_w as i64 &&
        self.y < surface_h as i64 &&
        self.x + self.width as i64 > 0 &&
        self.y + self.height as i64 > 0
    }

    /// Parte visibile su una superficie `surface_w` x `surface_h`, `None` se fuori
    pub fn clip_to(&self, surface_w: u32, surface_h: u32) -> Option<PixelRect> {
        if !self.intersects_surface(surface_w, surface_h) {
            return None;
        }
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.width as i64).min(surface_w as i64);
        let y1 = (self.y + self.height as i64).min(surface_h as i64);
        Some(PixelRect {
            x: x0,
            y: y0,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}
