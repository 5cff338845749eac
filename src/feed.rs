//! Outbound state streams.
//!
//! One `watch` channel per stream. Each keeps its last value, so a receiver
//! created late reads the current state straight away with `borrow()`.
//! Only the synchronous halves of the channels are used.

use std::sync::Arc;

use tokio::sync::watch;

use crate::boundary::BoundaryState;
use crate::filter::FilterState;
use crate::points::Point;
use crate::viewport::CameraCommand;

/// Snapshot of the active point set, in dataset order
pub type ActiveSet = Arc<[Point]>;

pub struct StateFeed {
    filter: watch::Sender<FilterState>,
    active_set: watch::Sender<ActiveSet>,
    boundary: watch::Sender<BoundaryState>,
    selection: watch::Sender<Option<Point>>,
    camera: watch::Sender<CameraCommand>,
}

impl StateFeed {
    pub fn new() -> Self {
        Self {
            filter: watch::Sender::new(FilterState::AllActive),
            active_set: watch::Sender::new(Arc::from(Vec::new())),
            boundary: watch::Sender::new(BoundaryState::default()),
            selection: watch::Sender::new(None),
            camera: watch::Sender::new(CameraCommand::DefaultOverview),
        }
    }

    pub fn publish_filter(&self, state: &FilterState) {
        replace_if_changed(&self.filter, state.clone());
    }

    /// Always published: every filter change is an `activeSetChanged`
    pub fn publish_active_set(&self, points: Vec<Point>) {
        self.active_set.send_replace(Arc::from(points));
    }

    pub fn publish_boundary(&self, state: &BoundaryState) {
        replace_if_changed(&self.boundary, state.clone());
    }

    pub fn publish_selection(&self, point: Option<Point>) {
        replace_if_changed(&self.selection, point);
    }

    /// Commands are never deduplicated; the host re-applies each one
    pub fn publish_camera(&self, command: CameraCommand) {
        self.camera.send_replace(command);
    }

    pub fn filter(&self) -> watch::Receiver<FilterState> {
        self.filter.subscribe()
    }

    pub fn active_set(&self) -> watch::Receiver<ActiveSet> {
        self.active_set.subscribe()
    }

    pub fn boundary(&self) -> watch::Receiver<BoundaryState> {
        self.boundary.subscribe()
    }

    pub fn selection(&self) -> watch::Receiver<Option<Point>> {
        self.selection.subscribe()
    }

    pub fn camera(&self) -> watch::Receiver<CameraCommand> {
        self.camera.subscribe()
    }
}

impl Default for StateFeed {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_if_changed<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLng;

    #[test]
    fn test_late_subscriber_sees_current_value() {
        let feed = StateFeed::new();
        feed.publish_filter(&FilterState::SearchActive("pune".to_string()));
        let rx = feed.filter();
        assert_eq!(*rx.borrow(), FilterState::SearchActive("pune".to_string()));
    }

    #[test]
    fn test_unchanged_value_not_marked() {
        let feed = StateFeed::new();
        let mut rx = feed.boundary();
        feed.publish_boundary(&BoundaryState::default());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_camera_repeats_are_delivered() {
        let feed = StateFeed::new();
        let mut rx = feed.camera();
        let cmd = CameraCommand::center_on(LatLng::new(18.5, 73.8));
        feed.publish_camera(cmd);
        assert_eq!(*rx.borrow_and_update(), cmd);
        feed.publish_camera(cmd);
        assert!(rx.has_changed().unwrap());
    }
}
