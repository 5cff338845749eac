//! Interface to the external rendering surface.
//!
//! Only `MarkerRegistry`, `BoundaryLoader` and the host touch a surface.

use std::collections::{BTreeMap, VecDeque};

use crate::boundary::Boundary;
use crate::points::{Point, PointId};

/// Opaque handle to one live marker, issued by the surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerHandle(pub u64);

/// Visual emphasis of a marker. `Selected` outranks `Hovered`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Emphasis {
    #[default]
    Normal,
    Hovered,
    Selected,
}

/// Interaction reported by the surface for one of its markers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Pointer entered a marker, or left all markers (`None`)
    Hovered(Option<PointId>),
    /// Marker clicked / activated
    Activated(PointId),
}

pub trait Surface {
    fn add_marker(&mut self, point: &Point) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn set_emphasis(&mut self, handle: MarkerHandle, emphasis: Emphasis);
    fn show_boundary(&mut self, boundary: &Boundary);
    fn clear_boundary(&mut self);
    /// Interaction events buffered since the last call
    fn take_events(&mut self) -> Vec<SurfaceEvent>;
}

/// One call made against a `RecordingSurface`
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceOp {
    Add(PointId, MarkerHandle),
    Remove(MarkerHandle),
    Emphasis(MarkerHandle, Emphasis),
    ShowBoundary(Option<String>),
    ClearBoundary,
}

/// Headless surface that keeps live markers in memory and records every
/// call. Used by headless runs, benchmarks and tests.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_handle: u64,
    live: BTreeMap<MarkerHandle, (PointId, Emphasis)>,
    boundary: Option<Boundary>,
    ops: Vec<SurfaceOp>,
    events: VecDeque<SurfaceEvent>,
    /// Emit `Activated` whenever a marker is emphasized as selected, the way
    /// map widgets fire click handlers when a popup is opened in code.
    echo_activation: bool,
    record: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            record: true,
            ..Self::default()
        }
    }

    /// Keeps state but skips the op log (benchmarks)
    pub fn unrecorded() -> Self {
        Self::default()
    }

    pub fn with_activation_echo(mut self) -> Self {
        self.echo_activation = true;
        self
    }

    /// Queue an interaction as if the user produced it
    pub fn push_event(&mut self, event: SurfaceEvent) {
        self.events.push_back(event);
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_points(&self) -> impl Iterator<Item = &PointId> {
        self.live.values().map(|(id, _)| id)
    }

    pub fn emphasis_of(&self, id: &PointId) -> Option<Emphasis> {
        self.live
            .values()
            .find(|(live_id, _)| live_id == id)
            .map(|(_, emphasis)| *emphasis)
    }

    pub fn boundary(&self) -> Option<&Boundary> {
        self.boundary.as_ref()
    }

    fn log(&mut self, op: SurfaceOp) {
        if self.record {
            self.ops.push(op);
        }
    }
}

impl Surface for RecordingSurface {
    fn add_marker(&mut self, point: &Point) -> MarkerHandle {
        self.next_handle += 1;
        let handle = MarkerHandle(self.next_handle);
        self.live.insert(handle, (point.id.clone(), Emphasis::Normal));
        self.log(SurfaceOp::Add(point.id.clone(), handle));
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        self.live.remove(&handle);
        self.log(SurfaceOp::Remove(handle));
    }

    fn set_emphasis(&mut self, handle: MarkerHandle, emphasis: Emphasis) {
        let Some((id, current)) = self.live.get_mut(&handle) else {
            return;
        };
        *current = emphasis;
        let id = id.clone();
        if self.echo_activation && emphasis == Emphasis::Selected {
            self.events.push_back(SurfaceEvent::Activated(id));
        }
        self.log(SurfaceOp::Emphasis(handle, emphasis));
    }

    fn show_boundary(&mut self, boundary: &Boundary) {
        self.boundary = Some(boundary.clone());
        self.log(SurfaceOp::ShowBoundary(boundary.name.clone()));
    }

    fn clear_boundary(&mut self) {
        self.boundary = None;
        self.log(SurfaceOp::ClearBoundary);
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        self.events.drain(..).collect()
    }
}
