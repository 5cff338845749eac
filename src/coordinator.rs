//! The filter state machine.
//!
//! Every entry point replaces the active dimension wholesale, then:
//! 1. recomputes the active set from the point store,
//! 2. reconciles markers against it,
//! 3. loads or clears the boundary,
//! 4. publishes a camera command for the active set,
//! 5. drops a selection the active set no longer admits.
//!
//! Calls run to completion; nothing here interleaves. The only asynchrony is
//! the boundary fetch, whose completions are applied in `tick`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::boundary::{BoundaryFetcher, BoundaryLoader, BoundaryState};
use crate::feed::StateFeed;
use crate::filter::FilterState;
use crate::markers::MarkerRegistry;
use crate::points::{Point, PointId, PointStore};
use crate::selection::{ReentryGuard, SelectionHighlighter, SelectionState};
use crate::surface::{Surface, SurfaceEvent};
use crate::viewport::{CameraCommand, ViewportFitter};

/// Events consumed from the host UI
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SelectCity(Option<String>),
    SetCategories(Vec<String>),
    ToggleCategory(String),
    Search(String),
    ActivateMarker(PointId),
    HoverMarker(Option<PointId>),
    Clear,
}

pub struct FilterCoordinator<S, F> {
    store: Arc<PointStore>,
    filter: FilterState,
    markers: MarkerRegistry,
    boundary: BoundaryLoader<F>,
    selection: SelectionHighlighter,
    fitter: ViewportFitter,
    feed: StateFeed,
    guard: ReentryGuard,
    surface: S,
}

impl<S: Surface, F: BoundaryFetcher> FilterCoordinator<S, F> {
    /// Starts in `AllActive` with every marker live and the camera fitted to
    /// the whole dataset.
    pub fn new(store: Arc<PointStore>, surface: S, fetcher: F) -> Self {
        let mut coordinator = Self {
            store,
            filter: FilterState::AllActive,
            markers: MarkerRegistry::new(),
            boundary: BoundaryLoader::new(fetcher),
            selection: SelectionHighlighter::new(),
            fitter: ViewportFitter,
            feed: StateFeed::new(),
            guard: ReentryGuard::new(),
            surface,
        };
        coordinator.apply(FilterState::AllActive, Instant::now());
        coordinator
    }

    pub fn store(&self) -> &PointStore {
        &self.store
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn feed(&self) -> &StateFeed {
        &self.feed
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    pub fn boundary(&self) -> &BoundaryState {
        self.boundary.state()
    }

    pub fn boundary_loader(&self) -> &BoundaryLoader<F> {
        &self.boundary
    }

    pub fn selection(&self) -> SelectionState {
        self.selection.state()
    }

    pub fn selected_point(&self) -> Option<&Point> {
        self.selection.selected().and_then(|id| self.store.get(id))
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// For the host to feed interaction events in; markers and boundary are
    /// owned by the coordinator and must not be edited through this.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Derived from the filter on every call, never cached
    pub fn active_points(&self) -> Vec<&Point> {
        self.filter.active_points(&self.store)
    }

    pub fn dispatch(&mut self, command: Command) {
        match command {
            Command::SelectCity(city) => self.select_city(city.as_deref()),
            Command::SetCategories(categories) => self.select_categories(categories),
            Command::ToggleCategory(category) => self.toggle_category(&category),
            Command::Search(query) => self.set_search(&query),
            Command::ActivateMarker(id) => self.activate(&id),
            Command::HoverMarker(id) => self.hover(id),
            Command::Clear => self.clear(),
        }
    }

    /// `None` shows everything. Unknown cities fall back to `AllActive`.
    pub fn select_city(&mut self, city: Option<&str>) {
        let next = FilterState::for_city(&self.store, city).unwrap_or_else(|err| {
            warn!(error = %err, "city rejected, showing all points");
            FilterState::AllActive
        });
        self.apply(next, Instant::now());
    }

    /// Empty set shows everything
    pub fn select_categories<I, T>(&mut self, categories: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let next = FilterState::for_categories(&self.store, categories).unwrap_or_else(|err| {
            warn!(error = %err, "categories rejected, showing all points");
            FilterState::AllActive
        });
        self.apply(next, Instant::now());
    }

    /// Flip one category in the current category set. Starts from an empty
    /// set when another dimension is active.
    pub fn toggle_category(&mut self, category: &str) {
        let category = category.trim();
        if category.is_empty() {
            return;
        }
        let mut names: Vec<String> = self
            .filter
            .categories()
            .map(|set| set.iter().map(str::to_string).collect())
            .unwrap_or_default();

        let key = category.to_lowercase();
        match names.iter().position(|n| n.to_lowercase() == key) {
            Some(idx) => {
                names.remove(idx);
            }
            None => names.push(category.to_string()),
        }
        self.select_categories(names);
    }

    /// Blank text shows everything
    pub fn set_search(&mut self, query: &str) {
        let next = FilterState::for_search(query).unwrap_or_else(|err| {
            debug!(error = %err, "search cleared");
            FilterState::AllActive
        });
        self.apply(next, Instant::now());
    }

    /// Back to `AllActive` with nothing selected
    pub fn clear(&mut self) {
        self.selection.reset(&self.markers, &mut self.surface);
        self.apply(FilterState::AllActive, Instant::now());
    }

    /// Marker click or list pick. Selects the point and centres on it.
    /// Activations raised while one is being applied are dropped.
    pub fn activate(&mut self, id: &PointId) {
        let Some(_token) = self.guard.try_enter() else {
            debug!(%id, "ignoring re-entrant activation");
            return;
        };
        let Some(point) = self.store.get(id).cloned() else {
            warn!(%id, "activation for unknown point");
            return;
        };

        let filter = &self.filter;
        let store = &self.store;
        let changed = self.selection.select(
            Some(point.id.clone()),
            |id| filter.admits(store, id),
            &self.markers,
            &mut self.surface,
        );
        if self.selection.selected() != Some(&point.id) {
            return;
        }

        if changed {
            info!(city = %point.city, "point selected");
        }
        self.feed.publish_camera(CameraCommand::center_on(point.position));
        self.publish_selection();

        // Surfaces may answer programmatic emphasis with their own events
        self.pump_events();
    }

    /// Pointer hover over a marker, `None` when it leaves
    pub fn hover(&mut self, id: Option<PointId>) {
        if let Some(ref id) = id {
            if !self.markers.contains(id) {
                return;
            }
        }
        self.selection.hover(id, &self.markers, &mut self.surface);
    }

    /// Apply boundary completions, expire timed highlights and process
    /// pending surface interactions.
    pub fn tick(&mut self, now: Instant) {
        let outcome = self.boundary.poll(&mut self.surface);
        if let Some(camera) = outcome.camera {
            self.feed.publish_camera(camera);
        }
        if outcome.changed {
            self.feed.publish_boundary(self.boundary.state());
        }

        self.selection.tick(now, &self.markers, &mut self.surface);
        self.pump_events();
    }

    fn pump_events(&mut self) {
        for event in self.markers.take_events(&mut self.surface) {
            match event {
                SurfaceEvent::Hovered(id) => self.hover(id),
                SurfaceEvent::Activated(id) => self.activate(&id),
            }
        }
    }

    fn apply(&mut self, next: FilterState, now: Instant) {
        if next != self.filter {
            info!(from = %self.filter, to = %next, "filter changed");
        }
        self.filter = next;

        let active: Vec<Point> = self
            .filter
            .active_points(&self.store)
            .into_iter()
            .cloned()
            .collect();

        self.markers.reconcile(active.iter(), &mut self.surface);

        match self.boundary_city(&active) {
            Some(city) => self.boundary.load(&city, &mut self.surface),
            None => self.boundary.clear(&mut self.surface),
        }

        self.feed.publish_camera(self.fitter.fit(active.iter()));

        // Activations echoed for the emphasis below are dropped while held
        let token = self.guard.try_enter();

        let filter = &self.filter;
        let store = &self.store;
        self.selection
            .retain(|id| filter.admits(store, id), &self.markers, &mut self.surface);
        self.selection.reapply(&self.markers, &mut self.surface);

        // A search that narrows to one point selects and flashes it
        if let (FilterState::SearchActive(_), [only]) = (&self.filter, active.as_slice()) {
            self.selection
                .select(Some(only.id.clone()), |_| true, &self.markers, &mut self.surface);
            self.selection
                .flash(only.id.clone(), now, &self.markers, &mut self.surface);
        }

        self.pump_events();
        drop(token);

        self.feed.publish_filter(&self.filter);
        self.feed.publish_active_set(active);
        self.feed.publish_boundary(self.boundary.state());
        self.publish_selection();
    }

    /// City whose outline should be shown for the current filter. Outlines
    /// are only loaded under the city and search dimensions.
    fn boundary_city(&self, active: &[Point]) -> Option<String> {
        match &self.filter {
            FilterState::CityActive(city) => Some(city.clone()),
            FilterState::SearchActive(query) => self
                .store
                .find_city(query)
                .map(|p| p.city.clone())
                .or_else(|| match active {
                    [only] => Some(only.city.clone()),
                    _ => None,
                }),
            FilterState::CategoryActive(_) | FilterState::AllActive => None,
        }
    }

    fn publish_selection(&self) {
        self.feed.publish_selection(self.selected_point().cloned());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use super::*;
    use crate::boundary::{BoundaryReply, BoundaryRequest, BoundaryStatus};
    use crate::data::sample_store;
    use crate::selection::HIGHLIGHT_TIMEOUT;
    use crate::surface::{Emphasis, RecordingSurface, SurfaceOp};

    #[derive(Default)]
    struct ParkedFetcher {
        requests: RefCell<Vec<(BoundaryRequest, BoundaryReply)>>,
    }

    impl BoundaryFetcher for ParkedFetcher {
        fn fetch(&self, request: BoundaryRequest, reply: BoundaryReply) {
            self.requests.borrow_mut().push((request, reply));
        }
    }

    fn coordinator() -> FilterCoordinator<RecordingSurface, ParkedFetcher> {
        FilterCoordinator::new(
            Arc::new(sample_store()),
            RecordingSurface::new(),
            ParkedFetcher::default(),
        )
    }

    fn requested_slugs(c: &FilterCoordinator<RecordingSurface, ParkedFetcher>) -> Vec<String> {
        c.boundary_loader()
            .fetcher()
            .requests
            .borrow()
            .iter()
            .map(|(r, _)| r.slug.clone())
            .collect()
    }

    #[test]
    fn test_starts_with_everything_visible() {
        let c = coordinator();
        assert_eq!(c.filter(), &FilterState::AllActive);
        assert_eq!(c.markers().len(), c.store().len());
        assert_eq!(c.surface().live_count(), c.store().len());
        assert_eq!(c.boundary().status, BoundaryStatus::Idle);
        assert!(matches!(*c.feed().camera().borrow(), CameraCommand::FitBounds { .. }));
    }

    #[test]
    fn test_select_city_loads_boundary() {
        let mut c = coordinator();
        c.select_city(Some("Pune"));
        assert_eq!(c.filter().city(), Some("Pune"));
        assert_eq!(c.markers().len(), 1);
        assert_eq!(c.boundary().status, BoundaryStatus::Loading);
        assert_eq!(requested_slugs(&c), vec!["pune"]);
    }

    #[test]
    fn test_unknown_city_falls_back() {
        let mut c = coordinator();
        c.select_city(Some("Pune"));
        c.select_city(Some("Gotham"));
        assert_eq!(c.filter(), &FilterState::AllActive);
        assert_eq!(c.boundary().status, BoundaryStatus::Idle);
        assert_eq!(c.markers().len(), c.store().len());
    }

    #[test]
    fn test_categories_never_show_boundary() {
        let mut c = coordinator();
        c.select_city(Some("Pune"));
        c.select_categories(["Education"]);
        // Education narrows to Pune alone, still no outline
        assert_eq!(c.active_points().len(), 1);
        assert_eq!(c.boundary().status, BoundaryStatus::Idle);
        assert!(c.boundary().geometry.is_none());
    }

    #[test]
    fn test_toggle_category() {
        let mut c = coordinator();
        c.toggle_category("industrial");
        c.toggle_category("Capital");
        assert_eq!(c.active_points().len(), 4);
        c.toggle_category("INDUSTRIAL");
        assert_eq!(c.active_points().len(), 1);
        c.toggle_category("capital");
        assert_eq!(c.filter(), &FilterState::AllActive);
    }

    #[test]
    fn test_toggle_from_other_dimension_starts_fresh() {
        let mut c = coordinator();
        c.set_search("maharashtra");
        c.toggle_category("Financial");
        let cities: Vec<_> = c.active_points().iter().map(|p| p.city.clone()).collect();
        assert_eq!(cities, vec!["Mumbai"]);
        assert_eq!(c.filter().search(), None);
    }

    #[test]
    fn test_single_search_result_selected_and_flashed() {
        let mut c = coordinator();
        c.set_search("sabarmati");
        assert!(c.active_points().is_empty());
        assert_eq!(*c.feed().camera().borrow(), CameraCommand::DefaultOverview);

        c.set_search("gujarat");
        assert_eq!(c.active_points().len(), 2);
        assert_eq!(c.selection().selected_id, None);

        c.set_search("varanasi");
        let id = PointId::from_city("Varanasi");
        assert_eq!(c.selection().selected_id, Some(id.clone()));
        assert_eq!(c.selection().hovered_id, Some(id.clone()));
        assert_eq!(requested_slugs(&c), vec!["varanasi"]);

        c.tick(Instant::now() + HIGHLIGHT_TIMEOUT + Duration::from_millis(1));
        assert_eq!(c.selection().hovered_id, None);
        assert_eq!(c.surface().emphasis_of(&id), Some(Emphasis::Selected));
    }

    #[test]
    fn test_search_exact_city_alias_loads_boundary() {
        let mut c = coordinator();
        c.set_search("Delhi");
        assert_eq!(requested_slugs(&c), vec!["delhi"]);
    }

    #[test]
    fn test_selection_cleared_when_filtered_out() {
        let mut c = coordinator();
        let pune = PointId::from_city("Pune");
        c.activate(&pune);
        assert_eq!(c.selected_point().map(|p| p.city.as_str()), Some("Pune"));

        c.select_categories(["Education", "Financial"]);
        assert_eq!(c.selection().selected_id, Some(pune.clone()));

        c.select_city(Some("Mumbai"));
        assert_eq!(c.selection().selected_id, None);
        assert_eq!(*c.feed().selection().borrow(), None);
    }

    #[test]
    fn test_activate_outside_active_set_ignored() {
        let mut c = coordinator();
        c.select_city(Some("Mumbai"));
        c.activate(&PointId::from_city("Pune"));
        assert_eq!(c.selection().selected_id, None);
    }

    #[test]
    fn test_activation_echo_does_not_recurse() {
        let mut c = FilterCoordinator::new(
            Arc::new(sample_store()),
            RecordingSurface::new().with_activation_echo(),
            ParkedFetcher::default(),
        );
        let mut camera = c.feed().camera();
        camera.mark_unchanged();

        let thane = PointId::from_city("Thane");
        c.surface_mut().take_ops();
        c.activate(&thane);

        let emphasis_ops = c
            .surface()
            .ops()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Emphasis(_, Emphasis::Selected)))
            .count();
        assert_eq!(emphasis_ops, 1);
        assert_eq!(c.selection().selected_id, Some(thane));
        assert!(camera.has_changed().unwrap());
    }

    #[test]
    fn test_surface_events_drive_selection() {
        let mut c = coordinator();
        let kochi = PointId::from_city("Kochi");
        c.surface_mut().push_event(SurfaceEvent::Hovered(Some(kochi.clone())));
        c.tick(Instant::now());
        assert_eq!(c.selection().hovered_id, Some(kochi.clone()));

        c.surface_mut().push_event(SurfaceEvent::Activated(kochi.clone()));
        c.tick(Instant::now());
        assert_eq!(c.selection().selected_id, Some(kochi));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut c = coordinator();
        c.select_city(Some("Chennai"));
        c.activate(&PointId::from_city("Chennai"));
        c.clear();
        assert_eq!(c.filter(), &FilterState::AllActive);
        assert_eq!(c.selection(), SelectionState::default());
        assert_eq!(c.boundary().status, BoundaryStatus::Idle);
        assert_eq!(c.markers().len(), c.store().len());
    }

    #[test]
    fn test_dispatch_routes_commands() {
        let mut c = coordinator();
        c.dispatch(Command::Search("kerala".to_string()));
        assert_eq!(c.filter().search(), Some("kerala"));
        c.dispatch(Command::SelectCity(None));
        assert_eq!(c.filter(), &FilterState::AllActive);
        c.dispatch(Command::SetCategories(vec!["Culture".to_string()]));
        assert_eq!(c.active_points().len(), 3);
        c.dispatch(Command::Clear);
        assert_eq!(c.filter(), &FilterState::AllActive);
    }
}
