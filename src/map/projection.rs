use std::f64::consts::PI;

use crate::geo::{GeoBounds, LatLng};
use crate::viewport::{CameraCommand, DEFAULT_CENTER, DEFAULT_ZOOM};

/// Width of the whole world in braille dots at zoom level 0
pub const WORLD_DOTS: f64 = 64.0;
/// Camera padding is given in 256px-tile pixels; this scales it to dots
const DOTS_PER_PIXEL: f64 = WORLD_DOTS / 256.0;
pub const MIN_ZOOM: f64 = 2.0;
pub const MAX_ZOOM: f64 = 18.0;
/// Zoom change for one key press or wheel notch
pub const ZOOM_STEP: f64 = 0.5;
const MAX_LAT: f64 = 85.051_128_78;

/// Web Mercator, normalized to [0, 1] on both axes
#[inline(always)]
fn mercator(c: LatLng) -> (f64, f64) {
    let x = (c.lng + 180.0) / 360.0;
    let lat_rad = c.lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    (x, y)
}

#[inline(always)]
fn inverse_mercator(x: f64, y: f64) -> LatLng {
    let lng = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}

/// Visible map area in braille dots
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    /// Slippy-map zoom level; each level doubles the scale
    pub zoom: f64,
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(center: LatLng, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    pub fn overview(width: usize, height: usize) -> Self {
        Self::new(DEFAULT_CENTER, DEFAULT_ZOOM, width, height)
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    #[inline(always)]
    fn world_size(&self) -> f64 {
        WORLD_DOTS * self.zoom.exp2()
    }

    /// Degrees of longitude covered by one dot
    pub fn degrees_per_dot(&self) -> f64 {
        360.0 / self.world_size()
    }

    /// Geographic coordinate to dot position
    #[inline]
    pub fn project(&self, c: LatLng) -> (i32, i32) {
        let (x, y) = mercator(c);
        let (cx, cy) = mercator(self.center);
        let scale = self.world_size();
        let px = (x - cx) * scale + self.width as f64 / 2.0;
        let py = (y - cy) * scale + self.height as f64 / 2.0;
        (px.round() as i32, py.round() as i32)
    }

    /// Dot position back to a geographic coordinate
    pub fn unproject(&self, px: i32, py: i32) -> LatLng {
        let (cx, cy) = mercator(self.center);
        let scale = self.world_size();
        let x = (px as f64 - self.width as f64 / 2.0) / scale + cx;
        let y = (py as f64 - self.height as f64 / 2.0) / scale + cy;
        inverse_mercator(x, y)
    }

    /// Move the centre by a dot offset
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let half_w = self.width as i32 / 2;
        let half_h = self.height as i32 / 2;
        let mut center = self.unproject(half_w + dx, half_h + dy);

        if center.lng > 180.0 {
            center.lng -= 360.0;
        } else if center.lng < -180.0 {
            center.lng += 360.0;
        }
        center.lat = center.lat.clamp(-85.0, 85.0);
        self.center = center;
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Zoom keeping the coordinate under (px, py) in place
    pub fn zoom_at(&mut self, px: i32, py: i32, delta: f64) {
        let anchor = self.unproject(px, py);
        self.zoom_by(delta);
        let (nx, ny) = self.project(anchor);
        self.pan(nx - px, ny - py);
    }

    /// Move the camera as instructed
    pub fn apply(&mut self, command: &CameraCommand) {
        match *command {
            CameraCommand::DefaultOverview => {
                self.center = DEFAULT_CENTER;
                self.zoom = DEFAULT_ZOOM;
            }
            CameraCommand::CenterZoom { center, zoom } => {
                self.center = center;
                self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
            }
            CameraCommand::FitBounds {
                bounds,
                padding,
                max_zoom,
            } => self.fit_bounds(bounds, padding, max_zoom),
        }
    }

    /// Largest whole zoom level at which `bounds` plus padding fits
    pub fn fit_bounds(&mut self, bounds: GeoBounds, padding: f64, max_zoom: Option<f64>) {
        let pad = padding * DOTS_PER_PIXEL;
        let avail_w = (self.width as f64 - 2.0 * pad).max(1.0);
        let avail_h = (self.height as f64 - 2.0 * pad).max(1.0);

        let (x0, y0) = mercator(bounds.south_west());
        let (x1, y1) = mercator(bounds.north_east());
        let span_x = (x1 - x0).abs();
        let span_y = (y1 - y0).abs();

        let level_for = |avail: f64, span: f64| {
            if span > 0.0 {
                (avail / (span * WORLD_DOTS)).log2()
            } else {
                f64::INFINITY
            }
        };
        let cap = max_zoom.map_or(MAX_ZOOM, |z| z.min(MAX_ZOOM));
        let fitted = level_for(avail_w, span_x).min(level_for(avail_h, span_y)).floor();

        self.zoom = fitted.min(cap).max(MIN_ZOOM);
        self.center = inverse_mercator((x0 + x1) / 2.0, (y0 + y1) / 2.0);
    }

    /// Check if a projected point is near enough to be drawn
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    /// Rough bounding-box test for a segment
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let (min_x, max_x) = (p1.0.min(p2.0), p1.0.max(p2.0));
        let (min_y, max_y) = (p1.1.min(p2.1), p1.1.max(p2.1));
        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::{BOUNDARY_MAX_ZOOM, FIT_PADDING};

    #[test]
    fn test_project_center() {
        let vp = Viewport::new(LatLng::new(18.52, 73.85), 10.0, 100, 60);
        assert_eq!(vp.project(vp.center), (50, 30));
    }

    #[test]
    fn test_unproject_inverts_project() {
        let vp = Viewport::new(LatLng::new(20.0, 78.0), 6.0, 200, 120);
        let c = vp.unproject(37, 91);
        assert_eq!(vp.project(c), (37, 91));
    }

    #[test]
    fn test_pan_moves_east() {
        let mut vp = Viewport::overview(100, 100);
        let before = vp.center.lng;
        vp.pan(10, 0);
        assert!(vp.center.lng > before);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut vp = Viewport::overview(100, 100);
        vp.zoom_by(100.0);
        assert_eq!(vp.zoom, MAX_ZOOM);
        vp.zoom_by(-100.0);
        assert_eq!(vp.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_fit_bounds_keeps_corners_visible() {
        let mut vp = Viewport::overview(200, 160);
        let bounds = GeoBounds::from_corners(LatLng::new(9.93, 72.57), LatLng::new(30.73, 88.36));
        vp.fit_bounds(bounds, FIT_PADDING, None);

        for corner in [bounds.south_west(), bounds.north_east()] {
            let (x, y) = vp.project(corner);
            assert!((0..200).contains(&x) && (0..160).contains(&y), "{corner:?} at {x},{y}");
        }
        assert_eq!(vp.zoom, vp.zoom.floor());
    }

    #[test]
    fn test_fit_bounds_respects_max_zoom() {
        let mut vp = Viewport::overview(200, 160);
        let tiny = GeoBounds::from_corners(LatLng::new(18.52, 73.85), LatLng::new(18.53, 73.86));
        vp.apply(&CameraCommand::fit_boundary(tiny));
        assert_eq!(vp.zoom, BOUNDARY_MAX_ZOOM);
    }

    #[test]
    fn test_default_overview() {
        let mut vp = Viewport::new(LatLng::new(0.0, 0.0), 12.0, 10, 10);
        vp.apply(&CameraCommand::DefaultOverview);
        assert_eq!(vp.center, DEFAULT_CENTER);
        assert_eq!(vp.zoom, DEFAULT_ZOOM);
    }
}
