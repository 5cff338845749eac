use std::time::{Duration, Instant};

use poi_map::boundary::FileBoundaryFetcher;
use poi_map::coordinator::FilterCoordinator;
use poi_map::locate::{Fix, LocateOutcome, LocationProvider, LocationWatch};
use poi_map::map::{MapSurface, Viewport, ZOOM_STEP};
use poi_map::points::Point;
use poi_map::viewport::CameraCommand;
use ratatui::layout::Rect;
use tokio::sync::watch;
use tracing::debug;

use crate::ui;

/// Quiet period after the last keystroke before a search is applied
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

pub type MapCoordinator = FilterCoordinator<MapSurface, FileBoundaryFetcher>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

/// Application state
pub struct App {
    pub coordinator: MapCoordinator,
    pub viewport: Viewport,
    camera: watch::Receiver<CameraCommand>,
    locate: LocationWatch<Box<dyn LocationProvider>>,
    /// Last position reported by geolocation
    pub located: Option<Fix>,
    /// One-line message shown in the status bar
    pub notice: Option<String>,
    pub mode: InputMode,
    pub search_input: String,
    search_due: Option<Instant>,
    /// Cursor into the active point list
    pub list_cursor: usize,
    city_cursor: Option<usize>,
    /// Character area of the map pane, inside its border
    pub map_inner: Rect,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    last_mouse: Option<(u16, u16)>,
    dragged: bool,
    /// Current mouse position for the cursor marker
    pub mouse_pos: Option<(u16, u16)>,
}

impl App {
    pub fn new(
        coordinator: MapCoordinator,
        locator: Box<dyn LocationProvider>,
        width: u16,
        height: u16,
    ) -> Self {
        let map_inner = ui::layout(Rect::new(0, 0, width, height)).map_inner;
        let mut camera = coordinator.feed().camera();
        let mut viewport = Viewport::overview(map_inner.width as usize * 2, map_inner.height as usize * 4);
        viewport.apply(&camera.borrow_and_update());

        Self {
            coordinator,
            viewport,
            camera,
            locate: LocationWatch::new(locator),
            located: None,
            notice: None,
            mode: InputMode::Normal,
            search_input: String::new(),
            search_due: None,
            list_cursor: 0,
            city_cursor: None,
            map_inner,
            should_quit: false,
            last_mouse: None,
            dragged: false,
            mouse_pos: None,
        }
    }

    /// Update pane geometry when the terminal resizes
    pub fn resize(&mut self, width: u16, height: u16) {
        self.map_inner = ui::layout(Rect::new(0, 0, width, height)).map_inner;
        self.viewport
            .resize(self.map_inner.width as usize * 2, self.map_inner.height as usize * 4);
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Advance timers and apply anything that arrived since the last frame
    pub fn tick(&mut self, now: Instant) {
        if self.search_due.is_some_and(|due| due <= now) {
            self.apply_search();
        }

        self.coordinator.tick(now);

        match self.locate.poll() {
            Some(LocateOutcome::Found { fix, camera }) => {
                self.located = Some(fix);
                self.notice = Some(format!("located, ±{:.0} m", fix.accuracy_m));
                self.viewport.apply(&camera);
            }
            Some(LocateOutcome::Failed(err)) => {
                self.notice = Some(format!("{err} (g to retry)"));
            }
            None => {}
        }

        self.sync_camera();
    }

    /// Apply the latest camera command, if a new one was published
    fn sync_camera(&mut self) {
        if self.camera.has_changed().unwrap_or(false) {
            let command = *self.camera.borrow_and_update();
            debug!(?command, "camera");
            self.viewport.apply(&command);
        }
    }

    pub fn active_points(&self) -> Vec<&Point> {
        self.coordinator.active_points()
    }

    // Search input

    pub fn begin_search(&mut self) {
        self.mode = InputMode::Search;
    }

    pub fn end_search(&mut self) {
        self.mode = InputMode::Normal;
    }

    pub fn search_push(&mut self, c: char, now: Instant) {
        self.search_input.push(c);
        self.search_due = Some(now + SEARCH_DEBOUNCE);
    }

    pub fn search_pop(&mut self, now: Instant) {
        self.search_input.pop();
        self.search_due = Some(now + SEARCH_DEBOUNCE);
    }

    /// Apply the search text now instead of waiting for the debounce
    pub fn submit_search(&mut self) {
        self.apply_search();
        self.mode = InputMode::Normal;
    }

    fn apply_search(&mut self) {
        self.search_due = None;
        self.coordinator.set_search(&self.search_input);
        self.after_filter_change();
    }

    // Filters

    /// Step through the city list; wraps to "all cities" at either end
    pub fn cycle_city(&mut self, forward: bool) {
        let cities = self.coordinator.store().cities();
        if cities.is_empty() {
            return;
        }
        let last = cities.len() - 1;
        self.city_cursor = match (self.city_cursor, forward) {
            (None, true) => Some(0),
            (None, false) => Some(last),
            (Some(i), true) if i < last => Some(i + 1),
            (Some(i), false) if i > 0 => Some(i - 1),
            _ => None,
        };
        let city = self.city_cursor.map(|i| cities[i].as_str());
        self.coordinator.select_city(city);
        self.search_input.clear();
        self.after_filter_change();
    }

    /// Toggle the n-th category (0-based) of the dataset
    pub fn toggle_category(&mut self, index: usize) {
        let categories = self.coordinator.store().categories();
        if let Some(category) = categories.get(index) {
            self.coordinator.toggle_category(category);
            self.search_input.clear();
            self.city_cursor = None;
            self.after_filter_change();
        }
    }

    pub fn clear(&mut self) {
        self.coordinator.clear();
        self.search_input.clear();
        self.search_due = None;
        self.city_cursor = None;
        self.after_filter_change();
    }

    fn after_filter_change(&mut self) {
        self.list_cursor = 0;
        self.sync_camera();
    }

    // List

    pub fn move_cursor(&mut self, down: bool) {
        let len = self.active_points().len();
        if len == 0 {
            self.list_cursor = 0;
        } else if down {
            self.list_cursor = (self.list_cursor + 1).min(len - 1);
        } else {
            self.list_cursor = self.list_cursor.saturating_sub(1);
        }
    }

    /// Activate the point under the list cursor
    pub fn activate_cursor(&mut self) {
        let id = self.active_points().get(self.list_cursor).map(|p| p.id.clone());
        if let Some(id) = id {
            self.coordinator.activate(&id);
            self.sync_camera();
        }
    }

    pub fn locate(&mut self) {
        self.notice = Some("locating…".to_string());
        self.locate.start();
    }

    // Map navigation

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_by(ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_by(-ZOOM_STEP);
    }

    /// Terminal cell to a dot position in the map pane, `None` outside it
    pub fn cell_to_dot(&self, col: u16, row: u16) -> Option<(i32, i32)> {
        let area = self.map_inner;
        if col < area.x || row < area.y || col >= area.x + area.width || row >= area.y + area.height {
            return None;
        }
        let px = (col - area.x) as i32 * 2 + 1;
        let py = (row - area.y) as i32 * 4 + 2;
        Some((px, py))
    }

    pub fn zoom_at(&mut self, col: u16, row: u16, zoom_in: bool) {
        if let Some((px, py)) = self.cell_to_dot(col, row) {
            let delta = if zoom_in { ZOOM_STEP } else { -ZOOM_STEP };
            self.viewport.zoom_at(px, py, delta);
        }
    }

    pub fn mouse_moved(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        let dot = self.cell_to_dot(col, row);
        let viewport = &self.viewport;
        let surface = self.coordinator.surface_mut();
        match dot {
            Some((px, py)) => surface.pointer_moved(px, py, viewport),
            None => surface.pointer_left(),
        }
    }

    pub fn mouse_down(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    /// Drag pans the map
    pub fn mouse_drag(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = (last_x as i32 - col as i32) * 2;
            let dy = (last_y as i32 - row as i32) * 4;
            if dx != 0 || dy != 0 {
                self.dragged = true;
                self.pan(dx, dy);
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Release without a drag is a click on the marker under the cursor
    pub fn mouse_up(&mut self, col: u16, row: u16) {
        let clicked = self.last_mouse.is_some() && !self.dragged;
        self.last_mouse = None;
        if !clicked {
            return;
        }
        if let Some((px, py)) = self.cell_to_dot(col, row) {
            let viewport = &self.viewport;
            self.coordinator.surface_mut().click(px, py, viewport);
        }
    }

    /// Mouse cell relative to the map pane, for the cursor marker
    pub fn mouse_cell(&self) -> Option<(u16, u16)> {
        let (col, row) = self.mouse_pos?;
        self.cell_to_dot(col, row)
            .map(|_| (col - self.map_inner.x, row - self.map_inner.y))
    }

    pub fn zoom_level(&self) -> String {
        format!("z{:.1}", self.viewport.zoom)
    }

    pub fn center_coords(&self) -> String {
        let c = self.viewport.center;
        format!(
            "{:.2}°{}, {:.2}°{}",
            c.lat.abs(),
            if c.lat >= 0.0 { "N" } else { "S" },
            c.lng.abs(),
            if c.lng >= 0.0 { "E" } else { "W" }
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use poi_map::data::builtin_store;
    use poi_map::filter::FilterState;
    use poi_map::locate::{FixedLocation, NoLocation};
    use poi_map::geo::LatLng;
    use poi_map::points::PointId;

    use super::*;

    fn app_with(locator: Box<dyn LocationProvider>) -> App {
        let coordinator = FilterCoordinator::new(
            Arc::new(builtin_store().unwrap()),
            MapSurface::new(),
            FileBoundaryFetcher::new("/nonexistent"),
        );
        App::new(coordinator, locator, 120, 40)
    }

    #[test]
    fn test_search_is_debounced() {
        let mut app = app_with(Box::new(NoLocation));
        let start = Instant::now();
        app.begin_search();
        for c in "pune".chars() {
            app.search_push(c, start);
        }
        app.tick(start + Duration::from_millis(100));
        assert_eq!(app.coordinator.filter(), &FilterState::AllActive);

        app.tick(start + SEARCH_DEBOUNCE);
        assert_eq!(app.coordinator.filter().search(), Some("pune"));
        assert_eq!(app.active_points().len(), 1);
    }

    #[test]
    fn test_cycle_city_wraps_to_all() {
        let mut app = app_with(Box::new(NoLocation));
        app.cycle_city(false);
        assert_eq!(app.coordinator.filter().city(), Some("Visakhapatnam"));
        app.cycle_city(true);
        assert_eq!(app.coordinator.filter(), &FilterState::AllActive);
        app.cycle_city(true);
        assert_eq!(app.coordinator.filter().city(), Some("Ahmedabad"));
    }

    #[test]
    fn test_city_selection_moves_camera() {
        let mut app = app_with(Box::new(NoLocation));
        app.cycle_city(true);
        assert_eq!(app.viewport.center, LatLng::new(23.0225, 72.5714));
    }

    #[test]
    fn test_list_activation_selects() {
        let mut app = app_with(Box::new(NoLocation));
        app.move_cursor(true);
        app.activate_cursor();
        assert_eq!(
            app.coordinator.selection().selected_id,
            Some(PointId::from_city("Bengaluru"))
        );
    }

    #[test]
    fn test_locate_centres_map() {
        let here = LatLng::new(12.9716, 77.5946);
        let mut app = app_with(Box::new(FixedLocation::new(here)));
        app.locate();
        app.tick(Instant::now());
        assert_eq!(app.located.map(|f| f.position), Some(here));
        assert_eq!(app.viewport.center, here);
    }

    #[test]
    fn test_locate_failure_sets_notice() {
        let mut app = app_with(Box::new(NoLocation));
        app.locate();
        app.tick(Instant::now());
        assert!(app.notice.as_deref().is_some_and(|n| n.contains("not supported")));
    }

    #[test]
    fn test_click_outside_map_ignored() {
        let mut app = app_with(Box::new(NoLocation));
        assert_eq!(app.cell_to_dot(119, 0), None);
        app.mouse_down(119, 0);
        app.mouse_up(119, 0);
        app.tick(Instant::now());
        assert_eq!(app.coordinator.selection().selected_id, None);
    }
}
