//! Pan/zoom transform between graph and screen coordinates.

use serde::Serialize;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 8.0;

/// `screen = k * graph + t`. The graph origin starts at the canvas center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub k: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            k: 1.0,
            tx: width / 2.0,
            ty: height / 2.0,
        }
    }

    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (self.k * x + self.tx, self.k * y + self.ty)
    }

    pub fn to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
        ((sx - self.tx) / self.k, (sy - self.ty) / self.k)
    }

    /// Multiply the scale by `factor`, keeping the graph point under
    /// (`sx`, `sy`) fixed on screen.
    pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let (gx, gy) = self.to_graph(sx, sy);
        self.k = (self.k * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.tx = sx - self.k * gx;
        self.ty = sy - self.k * gy;
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.tx += dx;
        self.ty += dy;
    }

    /// Track a canvas resize, keeping the same graph point at the center.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.tx += (width - self.width) / 2.0;
        self.ty += (height - self.height) / 2.0;
        self.width = width;
        self.height = height;
    }

    pub fn contains(&self, sx: f64, sy: f64) -> bool {
        sx >= 0.0 && sy >= 0.0 && sx <= self.width && sy <= self.height
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}
