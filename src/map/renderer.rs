use std::collections::BTreeMap;

use tracing::trace;

use crate::boundary::Boundary;
use crate::braille::BrailleCanvas;
use crate::geo::LatLng;
use crate::map::projection::Viewport;
use crate::map::spatial::SpatialGrid;
use crate::points::{Point, PointId};
use crate::surface::{Emphasis, MarkerHandle, Surface, SurfaceEvent};

/// A geographic polyline
pub type LineString = Vec<LatLng>;

/// Pointer distance, in dots, that still counts as touching a marker
pub const HIT_RADIUS_DOTS: i32 = 4;
/// Below this zoom only emphasized markers carry a label
const LABEL_ZOOM: f64 = 6.0;
/// Grid cell size for the marker index, in degrees
const INDEX_CELL_DEGREES: f64 = 1.0;

/// Display settings for map layers
#[derive(Clone, Copy, Debug)]
pub struct DisplaySettings {
    pub show_basemap: bool,
    pub show_labels: bool,
    pub show_boundary: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_basemap: true,
            show_labels: true,
            show_boundary: true,
        }
    }
}

/// One live marker
#[derive(Clone, Debug)]
pub struct MarkerSprite {
    pub id: PointId,
    pub position: LatLng,
    pub label: String,
    pub emphasis: Emphasis,
}

/// A marker placed on the character grid
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerGlyph {
    pub col: u16,
    pub row: u16,
    pub emphasis: Emphasis,
    pub label: Option<String>,
}

/// Rendered layers, back to front
pub struct MapLayers {
    pub basemap: BrailleCanvas,
    pub boundary: BrailleCanvas,
    /// Sorted so that higher emphasis is drawn last
    pub markers: Vec<MarkerGlyph>,
}

/// Terminal map surface. Owns the basemap, live markers and the boundary
/// outline, and turns pointer input into surface events.
pub struct MapSurface {
    basemap: Vec<LineString>,
    markers: BTreeMap<MarkerHandle, MarkerSprite>,
    next_handle: u64,
    boundary: Option<Boundary>,
    index: SpatialGrid<MarkerHandle>,
    index_stale: bool,
    events: Vec<SurfaceEvent>,
    pointer_over: Option<MarkerHandle>,
    pub settings: DisplaySettings,
}

impl MapSurface {
    pub fn new() -> Self {
        Self {
            basemap: Vec::new(),
            markers: BTreeMap::new(),
            next_handle: 0,
            boundary: None,
            index: SpatialGrid::new(INDEX_CELL_DEGREES),
            index_stale: false,
            events: Vec::new(),
            pointer_over: None,
            settings: DisplaySettings::default(),
        }
    }

    /// Lines with fewer than two points are dropped; returns whether `line` was kept
    pub fn add_basemap_line(&mut self, line: LineString) -> bool {
        if line.len() < 2 {
            return false;
        }
        self.basemap.push(line);
        true
    }

    pub fn has_basemap(&self) -> bool {
        !self.basemap.is_empty()
    }

    pub fn boundary(&self) -> Option<&Boundary> {
        self.boundary.as_ref()
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerSprite> {
        self.markers.values()
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    pub fn toggle_basemap(&mut self) {
        self.settings.show_basemap = !self.settings.show_basemap;
    }

    pub fn toggle_boundary(&mut self) {
        self.settings.show_boundary = !self.settings.show_boundary;
    }

    /// Render all layers for a `cols` x `rows` character area
    pub fn render(&self, cols: usize, rows: usize, viewport: &Viewport) -> MapLayers {
        let mut basemap = BrailleCanvas::new(cols, rows);
        let mut outline = BrailleCanvas::new(cols, rows);

        if self.settings.show_basemap {
            for line in &self.basemap {
                draw_linestring(&mut basemap, line, viewport, false);
            }
        }

        if self.settings.show_boundary {
            if let Some(ref boundary) = self.boundary {
                for ring in &boundary.rings {
                    draw_linestring(&mut outline, ring, viewport, true);
                }
            }
        }

        let show_all_labels = self.settings.show_labels && viewport.zoom >= LABEL_ZOOM;
        let mut markers: Vec<MarkerGlyph> = self
            .markers
            .values()
            .filter_map(|m| {
                let (px, py) = viewport.project(m.position);
                if px < 0 || py < 0 || !viewport.is_visible(px, py) {
                    return None;
                }
                let (col, row) = ((px / 2) as usize, (py / 4) as usize);
                if col >= cols || row >= rows {
                    return None;
                }
                let labelled = show_all_labels || m.emphasis != Emphasis::Normal;
                Some(MarkerGlyph {
                    col: col as u16,
                    row: row as u16,
                    emphasis: m.emphasis,
                    label: labelled.then(|| m.label.clone()),
                })
            })
            .collect();
        markers.sort_by_key(|g| g.emphasis);

        MapLayers {
            basemap,
            boundary: outline,
            markers,
        }
    }

    fn rebuild_index(&mut self) {
        if !self.index_stale {
            return;
        }
        self.index.clear();
        for (&handle, sprite) in &self.markers {
            self.index.insert(sprite.position, handle);
        }
        self.index_stale = false;
    }

    /// Nearest marker within `HIT_RADIUS_DOTS` of a dot position
    pub fn marker_at(&mut self, px: i32, py: i32, viewport: &Viewport) -> Option<MarkerHandle> {
        self.rebuild_index();
        let at = viewport.unproject(px, py);
        let radius = viewport.degrees_per_dot() * HIT_RADIUS_DOTS as f64;

        self.index
            .query_radius(at, radius)
            .filter_map(|&(position, handle)| {
                let (mx, my) = viewport.project(position);
                let d2 = (mx - px).pow(2) + (my - py).pow(2);
                (d2 <= HIT_RADIUS_DOTS * HIT_RADIUS_DOTS).then_some((d2, handle))
            })
            .min()
            .map(|(_, handle)| handle)
    }

    /// Track the pointer; emits `Hovered` when it enters or leaves a marker
    pub fn pointer_moved(&mut self, px: i32, py: i32, viewport: &Viewport) {
        let hit = self.marker_at(px, py, viewport);
        self.set_pointer(hit);
    }

    pub fn pointer_left(&mut self) {
        self.set_pointer(None);
    }

    fn set_pointer(&mut self, hit: Option<MarkerHandle>) {
        if hit == self.pointer_over {
            return;
        }
        self.pointer_over = hit;
        let id = hit.and_then(|h| self.markers.get(&h)).map(|m| m.id.clone());
        self.events.push(SurfaceEvent::Hovered(id));
    }

    /// Click at a dot position. Returns true when a marker was hit.
    pub fn click(&mut self, px: i32, py: i32, viewport: &Viewport) -> bool {
        let Some(handle) = self.marker_at(px, py, viewport) else {
            return false;
        };
        if let Some(sprite) = self.markers.get(&handle) {
            trace!(id = %sprite.id, "marker clicked");
            self.events.push(SurfaceEvent::Activated(sprite.id.clone()));
        }
        true
    }
}

impl Default for MapSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for MapSurface {
    fn add_marker(&mut self, point: &Point) -> MarkerHandle {
        self.next_handle += 1;
        let handle = MarkerHandle(self.next_handle);
        self.markers.insert(
            handle,
            MarkerSprite {
                id: point.id.clone(),
                position: point.position,
                label: point.city.clone(),
                emphasis: Emphasis::Normal,
            },
        );
        self.index_stale = true;
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if self.markers.remove(&handle).is_some() {
            self.index_stale = true;
        }
        if self.pointer_over == Some(handle) {
            self.pointer_over = None;
        }
    }

    fn set_emphasis(&mut self, handle: MarkerHandle, emphasis: Emphasis) {
        if let Some(sprite) = self.markers.get_mut(&handle) {
            sprite.emphasis = emphasis;
        }
    }

    fn show_boundary(&mut self, boundary: &Boundary) {
        self.boundary = Some(boundary.clone());
    }

    fn clear_boundary(&mut self) {
        self.boundary = None;
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Draw a polyline, skipping segments that are off screen or that wrap
/// around the antimeridian
fn draw_linestring(canvas: &mut BrailleCanvas, line: &[LatLng], viewport: &Viewport, thick: bool) {
    let mut prev: Option<(i32, i32)> = None;

    for &c in line {
        let p = viewport.project(c);
        if let Some(q) = prev {
            let dist = ((p.0 - q.0).abs() + (p.1 - q.1).abs()) as usize;
            if dist < viewport.width.max(1) * 2 && viewport.line_might_be_visible(q, p) {
                if thick {
                    canvas.thick_line(q, p);
                } else {
                    canvas.line(q, p);
                }
            }
        }
        prev = Some(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_store;
    use crate::geo::GeoBounds;
    use crate::markers::MarkerRegistry;

    fn surface_with_markers() -> (MapSurface, MarkerRegistry) {
        let store = sample_store();
        let mut surface = MapSurface::new();
        let mut markers = MarkerRegistry::new();
        markers.reconcile(store.iter(), &mut surface);
        (surface, markers)
    }

    fn pune_viewport() -> Viewport {
        Viewport::new(LatLng::new(18.52, 73.86), 9.0, 200, 120)
    }

    #[test]
    fn test_click_on_marker_emits_activation() {
        let (mut surface, _) = surface_with_markers();
        let vp = pune_viewport();
        let (px, py) = vp.project(LatLng::new(18.5204, 73.8567));

        assert!(surface.click(px + 1, py, &vp));
        assert_eq!(
            surface.take_events(),
            vec![SurfaceEvent::Activated(PointId::from_city("Pune"))]
        );
        assert!(!surface.click(199, 119, &vp));
    }

    #[test]
    fn test_hover_enter_and_leave() {
        let (mut surface, _) = surface_with_markers();
        let vp = pune_viewport();
        let (px, py) = vp.project(LatLng::new(18.5204, 73.8567));

        surface.pointer_moved(px, py, &vp);
        surface.pointer_moved(px, py + 1, &vp);
        surface.pointer_moved(199, 119, &vp);
        assert_eq!(
            surface.take_events(),
            vec![
                SurfaceEvent::Hovered(Some(PointId::from_city("Pune"))),
                SurfaceEvent::Hovered(None),
            ]
        );
    }

    #[test]
    fn test_removed_marker_not_hit() {
        let (mut surface, mut markers) = surface_with_markers();
        let vp = pune_viewport();
        let (px, py) = vp.project(LatLng::new(18.5204, 73.8567));

        markers.remove(&PointId::from_city("Pune"), &mut surface);
        assert_eq!(surface.marker_at(px, py, &vp), None);
    }

    #[test]
    fn test_selected_marker_drawn_last_with_label() {
        let (mut surface, markers) = surface_with_markers();
        surface.settings.show_labels = false;
        markers.set_emphasis(&PointId::from_city("Mumbai"), Emphasis::Selected, &mut surface);

        let layers = surface.render(100, 40, &Viewport::overview(200, 160));
        let last = layers.markers.last().unwrap();
        assert_eq!(last.emphasis, Emphasis::Selected);
        assert_eq!(last.label.as_deref(), Some("Mumbai"));
        assert!(layers.markers.iter().filter(|g| g.label.is_some()).count() == 1);
    }

    #[test]
    fn test_boundary_drawn_on_its_own_layer() {
        let mut surface = MapSurface::new();
        let ring = vec![
            LatLng::new(18.4, 73.7),
            LatLng::new(18.4, 74.0),
            LatLng::new(18.7, 74.0),
            LatLng::new(18.4, 73.7),
        ];
        let bounds = GeoBounds::enclosing(ring.iter().copied()).unwrap();
        surface.show_boundary(&Boundary {
            name: Some("Pune".to_string()),
            rings: vec![ring],
            bounds,
        });

        let layers = surface.render(100, 30, &pune_viewport());
        let drawn = (0..30).any(|r| (0..100).any(|c| layers.boundary.glyph(c, r).is_some()));
        assert!(drawn);

        surface.clear_boundary();
        assert!(surface.boundary().is_none());
    }
}
