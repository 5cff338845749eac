use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::points::{Point, PointId};
use crate::surface::{Emphasis, MarkerHandle, Surface, SurfaceEvent};

/// Outcome of one `reconcile` call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub kept: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Owns the mapping from point identity to live marker handle.
/// At most one handle per `PointId`.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    live: BTreeMap<PointId, MarkerHandle>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the live set in line with `target`: remove handles for points
    /// that left, add handles for points that joined, leave the rest alone.
    pub fn reconcile<'a, S, I>(&mut self, target: I, surface: &mut S) -> ReconcileReport
    where
        S: Surface + ?Sized,
        I: IntoIterator<Item = &'a Point>,
    {
        let target: Vec<&Point> = target.into_iter().collect();
        let wanted: BTreeSet<&PointId> = target.iter().map(|p| &p.id).collect();

        let stale: Vec<PointId> = self
            .live
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();

        let mut report = ReconcileReport::default();
        for id in &stale {
            if self.remove(id, surface) {
                report.removed += 1;
            }
        }

        for point in target {
            if !self.live.contains_key(&point.id) {
                self.add(point, surface);
                report.added += 1;
            }
        }
        report.kept = self.live.len() - report.added;

        debug!(
            added = report.added,
            removed = report.removed,
            kept = report.kept,
            "reconciled markers"
        );
        report
    }

    /// Add a marker for `point` unless one is already live
    pub fn add<S: Surface + ?Sized>(&mut self, point: &Point, surface: &mut S) -> MarkerHandle {
        if let Some(&handle) = self.live.get(&point.id) {
            return handle;
        }
        let handle = surface.add_marker(point);
        trace!(id = %point.id, ?handle, "marker added");
        self.live.insert(point.id.clone(), handle);
        handle
    }

    /// Remove the marker for `id`; returns false if none was live
    pub fn remove<S: Surface + ?Sized>(&mut self, id: &PointId, surface: &mut S) -> bool {
        match self.live.remove(id) {
            Some(handle) => {
                surface.remove_marker(handle);
                trace!(%id, ?handle, "marker removed");
                true
            }
            None => false,
        }
    }

    /// Remove every live marker
    pub fn clear<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        for (_, handle) in std::mem::take(&mut self.live) {
            surface.remove_marker(handle);
        }
    }

    pub fn get(&self, id: &PointId) -> Option<MarkerHandle> {
        self.live.get(id).copied()
    }

    /// Lookup by any spelling of the city name, aliases included
    pub fn lookup(&self, city: &str) -> Option<MarkerHandle> {
        self.get(&PointId::from_city(city))
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.live.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &PointId> {
        self.live.keys()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Apply emphasis to the live marker for `id`; false if none is live
    pub fn set_emphasis<S: Surface + ?Sized>(
        &self,
        id: &PointId,
        emphasis: Emphasis,
        surface: &mut S,
    ) -> bool {
        match self.live.get(id) {
            Some(&handle) => {
                surface.set_emphasis(handle, emphasis);
                true
            }
            None => false,
        }
    }

    /// Drain surface interactions, dropping any that refer to markers that
    /// are no longer live.
    pub fn take_events<S: Surface + ?Sized>(&self, surface: &mut S) -> Vec<SurfaceEvent> {
        surface
            .take_events()
            .into_iter()
            .filter(|event| match event {
                SurfaceEvent::Hovered(None) => true,
                SurfaceEvent::Hovered(Some(id)) | SurfaceEvent::Activated(id) => {
                    let live = self.live.contains_key(id);
                    if !live {
                        trace!(%id, "dropped event for stale marker");
                    }
                    live
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_store;
    use crate::surface::{RecordingSurface, SurfaceOp};

    #[test]
    fn test_reconcile_adds_all_then_noop() {
        let store = sample_store();
        let mut surface = RecordingSurface::new();
        let mut registry = MarkerRegistry::new();

        let first = registry.reconcile(store.iter(), &mut surface);
        assert_eq!(first.added, store.len());
        assert_eq!(registry.len(), store.len());

        surface.take_ops();
        let second = registry.reconcile(store.iter(), &mut surface);
        assert!(second.is_noop());
        assert_eq!(second.kept, store.len());
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn test_reconcile_symmetric_difference() {
        let store = sample_store();
        let mut surface = RecordingSurface::new();
        let mut registry = MarkerRegistry::new();

        let pune = store.find_city("Pune").unwrap();
        let thane = store.find_city("Thane").unwrap();
        let mumbai = store.find_city("Mumbai").unwrap();

        registry.reconcile([pune, thane], &mut surface);
        let thane_handle = registry.get(&thane.id).unwrap();
        surface.take_ops();

        let report = registry.reconcile([thane, mumbai], &mut surface);
        assert_eq!(report, ReconcileReport { added: 1, removed: 1, kept: 1 });
        assert_eq!(registry.get(&thane.id), Some(thane_handle));
        assert!(!registry.contains(&pune.id));

        let ops = surface.take_ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[1], SurfaceOp::Add(id, _) if *id == mumbai.id));
    }

    #[test]
    fn test_lookup_tolerates_alias() {
        let store = sample_store();
        let mut surface = RecordingSurface::new();
        let mut registry = MarkerRegistry::new();
        registry.reconcile(store.iter(), &mut surface);

        let handle = registry.lookup("New Delhi").unwrap();
        assert_eq!(registry.lookup("delhi"), Some(handle));
        assert_eq!(registry.lookup("DELHI"), Some(handle));
    }

    #[test]
    fn test_stale_events_dropped() {
        let store = sample_store();
        let mut surface = RecordingSurface::new();
        let mut registry = MarkerRegistry::new();
        let pune = store.find_city("Pune").unwrap();
        registry.reconcile([pune], &mut surface);

        surface.push_event(SurfaceEvent::Activated(PointId::from_city("Mumbai")));
        surface.push_event(SurfaceEvent::Activated(pune.id.clone()));
        surface.push_event(SurfaceEvent::Hovered(None));

        let events = registry.take_events(&mut surface);
        assert_eq!(
            events,
            vec![SurfaceEvent::Activated(pune.id.clone()), SurfaceEvent::Hovered(None)]
        );
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = sample_store();
        let mut surface = RecordingSurface::new();
        let mut registry = MarkerRegistry::new();
        registry.reconcile(store.iter(), &mut surface);
        registry.clear(&mut surface);
        assert!(registry.is_empty());
        assert_eq!(surface.live_count(), 0);
    }
}
