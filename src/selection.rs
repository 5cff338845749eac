use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::markers::MarkerRegistry;
use crate::points::PointId;
use crate::surface::{Emphasis, Surface};

/// How long a non-pointer highlight (e.g. a single search hit) stays on
pub const HIGHLIGHT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected_id: Option<PointId>,
    pub hovered_id: Option<PointId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Hover {
    id: PointId,
    /// `None` for pointer hover, which lasts until the pointer leaves
    expires: Option<Instant>,
}

/// Tracks the selected point and the transiently hovered one, and keeps the
/// surface emphasis in line with them.
#[derive(Debug, Default)]
pub struct SelectionHighlighter {
    selected: Option<PointId>,
    hovered: Option<Hover>,
}

impl SelectionHighlighter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&PointId> {
        self.selected.as_ref()
    }

    pub fn hovered(&self) -> Option<&PointId> {
        self.hovered.as_ref().map(|h| &h.id)
    }

    pub fn state(&self) -> SelectionState {
        SelectionState {
            selected_id: self.selected.clone(),
            hovered_id: self.hovered().cloned(),
        }
    }

    /// Emphasis `id` should currently carry
    pub fn emphasis_for(&self, id: &PointId) -> Emphasis {
        if self.selected.as_ref() == Some(id) {
            Emphasis::Selected
        } else if self.hovered() == Some(id) {
            Emphasis::Hovered
        } else {
            Emphasis::Normal
        }
    }

    /// Select `id`, or clear with `None`. Ids the active set does not admit
    /// are ignored. Returns true when the selection changed.
    pub fn select<S, A>(
        &mut self,
        id: Option<PointId>,
        admits: A,
        markers: &MarkerRegistry,
        surface: &mut S,
    ) -> bool
    where
        S: Surface + ?Sized,
        A: Fn(&PointId) -> bool,
    {
        if let Some(ref id) = id {
            if !admits(id) {
                debug!(%id, "ignoring selection outside the active set");
                return false;
            }
        }
        if self.selected == id {
            return false;
        }

        let previous = std::mem::replace(&mut self.selected, id);
        if let Some(prev) = previous {
            markers.set_emphasis(&prev, self.emphasis_for(&prev), surface);
        }
        if let Some(ref current) = self.selected {
            markers.set_emphasis(current, Emphasis::Selected, surface);
        }
        trace!(selected = ?self.selected, "selection changed");
        true
    }

    /// Pointer hover; lasts until `hover(None)` or another hover
    pub fn hover<S: Surface + ?Sized>(
        &mut self,
        id: Option<PointId>,
        markers: &MarkerRegistry,
        surface: &mut S,
    ) -> bool {
        self.set_hover(id.map(|id| Hover { id, expires: None }), markers, surface)
    }

    /// Timed highlight that reverts after `HIGHLIGHT_TIMEOUT`
    pub fn flash<S: Surface + ?Sized>(
        &mut self,
        id: PointId,
        now: Instant,
        markers: &MarkerRegistry,
        surface: &mut S,
    ) -> bool {
        let hover = Hover {
            id,
            expires: Some(now + HIGHLIGHT_TIMEOUT),
        };
        self.set_hover(Some(hover), markers, surface)
    }

    fn set_hover<S: Surface + ?Sized>(
        &mut self,
        hover: Option<Hover>,
        markers: &MarkerRegistry,
        surface: &mut S,
    ) -> bool {
        if self.hovered == hover {
            return false;
        }
        let previous = std::mem::replace(&mut self.hovered, hover);
        if let Some(prev) = previous {
            markers.set_emphasis(&prev.id, self.emphasis_for(&prev.id), surface);
        }
        if let Some(id) = self.hovered().cloned() {
            markers.set_emphasis(&id, self.emphasis_for(&id), surface);
        }
        true
    }

    /// Revert a timed highlight once it has expired
    pub fn tick<S: Surface + ?Sized>(
        &mut self,
        now: Instant,
        markers: &MarkerRegistry,
        surface: &mut S,
    ) -> bool {
        let expired = self
            .hovered
            .as_ref()
            .and_then(|h| h.expires)
            .is_some_and(|at| at <= now);
        if expired {
            trace!("timed highlight expired");
            self.set_hover(None, markers, surface)
        } else {
            false
        }
    }

    /// Drop selection and hover that the active set no longer admits.
    /// Returns true when the selection was cleared.
    pub fn retain<S, A>(&mut self, admits: A, markers: &MarkerRegistry, surface: &mut S) -> bool
    where
        S: Surface + ?Sized,
        A: Fn(&PointId) -> bool,
    {
        if self.hovered().is_some_and(|id| !admits(id)) {
            self.hovered = None;
        }
        let stale = self.selected.as_ref().is_some_and(|id| !admits(id));
        if stale {
            debug!(selected = ?self.selected, "selection left the active set");
            self.select(None, |_| true, markers, surface)
        } else {
            false
        }
    }

    /// Re-apply emphasis for tracked points, e.g. after markers were re-added
    pub fn reapply<S: Surface + ?Sized>(&self, markers: &MarkerRegistry, surface: &mut S) {
        for id in self.selected.iter().chain(self.hovered()) {
            markers.set_emphasis(id, self.emphasis_for(id), surface);
        }
    }

    /// Clear selection and hover
    pub fn reset<S: Surface + ?Sized>(&mut self, markers: &MarkerRegistry, surface: &mut S) -> bool {
        let hover_changed = self.set_hover(None, markers, surface);
        let select_changed = self.select(None, |_| true, markers, surface);
        hover_changed || select_changed
    }
}

/// Scoped "selection in progress" flag. Entering while a token is alive
/// fails; the token releases the flag on drop, unwinding included.
#[derive(Clone, Debug, Default)]
pub struct ReentryGuard {
    busy: Rc<Cell<bool>>,
}

#[derive(Debug)]
pub struct ReentryToken {
    busy: Rc<Cell<bool>>,
}

impl ReentryGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_enter(&self) -> Option<ReentryToken> {
        if self.busy.replace(true) {
            return None;
        }
        Some(ReentryToken {
            busy: Rc::clone(&self.busy),
        })
    }

    pub fn is_held(&self) -> bool {
        self.busy.get()
    }
}

impl Drop for ReentryToken {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}
