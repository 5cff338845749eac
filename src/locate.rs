//! Geolocation watch.
//!
//! A watch is started on request and torn down after its first fix, on a
//! failure, or when it is dropped. It never touches the filter state; the
//! host applies the camera command it produces.

use tracing::{debug, info, warn};

use crate::error::GeolocationError;
use crate::geo::LatLng;
use crate::viewport::CameraCommand;

/// Zoom used when centring on the user's position
pub const LOCATED_ZOOM: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fix {
    pub position: LatLng,
    /// Radius of uncertainty in metres
    pub accuracy_m: f64,
}

/// Source of position readings
pub trait LocationProvider {
    /// Next reading, if one is ready
    fn poll(&mut self) -> Option<Result<Fix, GeolocationError>>;
    /// Stop producing readings and release whatever the provider holds
    fn stop(&mut self);
}

impl<P: LocationProvider + ?Sized> LocationProvider for Box<P> {
    fn poll(&mut self) -> Option<Result<Fix, GeolocationError>> {
        (**self).poll()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Reports the same position on every poll
#[derive(Clone, Debug)]
pub struct FixedLocation {
    fix: Fix,
}

impl FixedLocation {
    pub fn new(position: LatLng) -> Self {
        Self {
            fix: Fix {
                position,
                accuracy_m: 0.0,
            },
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.fix.accuracy_m = accuracy_m;
        self
    }
}

impl LocationProvider for FixedLocation {
    fn poll(&mut self) -> Option<Result<Fix, GeolocationError>> {
        Some(Ok(self.fix))
    }

    fn stop(&mut self) {}
}

/// Platform without geolocation
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn poll(&mut self) -> Option<Result<Fix, GeolocationError>> {
        Some(Err(GeolocationError::Unsupported))
    }

    fn stop(&mut self) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum LocateOutcome {
    Found { fix: Fix, camera: CameraCommand },
    Failed(GeolocationError),
}

pub struct LocationWatch<P: LocationProvider> {
    provider: P,
    active: bool,
}

impl<P: LocationProvider> LocationWatch<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Begin watching. Restarting an active watch is a no-op.
    pub fn start(&mut self) {
        if !self.active {
            debug!("location watch started");
            self.active = true;
        }
    }

    /// Check for a reading. The watch stops after the first fix or error.
    pub fn poll(&mut self) -> Option<LocateOutcome> {
        if !self.active {
            return None;
        }
        let outcome = match self.provider.poll()? {
            Ok(fix) => {
                info!(lat = fix.position.lat, lng = fix.position.lng, accuracy_m = fix.accuracy_m, "location found");
                LocateOutcome::Found {
                    fix,
                    camera: CameraCommand::CenterZoom {
                        center: fix.position,
                        zoom: LOCATED_ZOOM,
                    },
                }
            }
            Err(err) => {
                warn!(error = %err, "location unavailable");
                LocateOutcome::Failed(err)
            }
        };
        self.stop();
        Some(outcome)
    }

    pub fn stop(&mut self) {
        if self.active {
            self.provider.stop();
            self.active = false;
            debug!("location watch stopped");
        }
    }
}

impl<P: LocationProvider> Drop for LocationWatch<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    /// Yields `None` for `pending` polls, then a fix; counts `stop` calls
    struct Scripted {
        pending: usize,
        stops: Rc<Cell<u32>>,
    }

    impl LocationProvider for Scripted {
        fn poll(&mut self) -> Option<Result<Fix, GeolocationError>> {
            if self.pending > 0 {
                self.pending -= 1;
                return None;
            }
            Some(Ok(Fix {
                position: LatLng::new(12.97, 77.59),
                accuracy_m: 30.0,
            }))
        }

        fn stop(&mut self) {
            self.stops.set(self.stops.get() + 1);
        }
    }

    #[test]
    fn test_idle_watch_reports_nothing() {
        let mut watch = LocationWatch::new(FixedLocation::new(LatLng::new(1.0, 2.0)));
        assert_eq!(watch.poll(), None);
    }

    #[test]
    fn test_first_fix_centres_and_stops() {
        let stops = Rc::new(Cell::new(0));
        let mut watch = LocationWatch::new(Scripted {
            pending: 2,
            stops: Rc::clone(&stops),
        });
        watch.start();
        assert_eq!(watch.poll(), None);
        assert_eq!(watch.poll(), None);

        let Some(LocateOutcome::Found { fix, camera }) = watch.poll() else {
            panic!("expected a fix");
        };
        assert_eq!(
            camera,
            CameraCommand::CenterZoom {
                center: fix.position,
                zoom: LOCATED_ZOOM
            }
        );
        assert!(!watch.is_active());
        assert_eq!(stops.get(), 1);
        assert_eq!(watch.poll(), None);

        drop(watch);
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_drop_tears_down_active_watch() {
        let stops = Rc::new(Cell::new(0));
        let mut watch = LocationWatch::new(Scripted {
            pending: 10,
            stops: Rc::clone(&stops),
        });
        watch.start();
        watch.poll();
        drop(watch);
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_failure_is_reported() {
        let mut watch = LocationWatch::new(NoLocation);
        watch.start();
        assert_eq!(
            watch.poll(),
            Some(LocateOutcome::Failed(GeolocationError::Unsupported))
        );
        assert!(!watch.is_active());
    }
}
