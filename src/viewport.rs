use crate::geo::{GeoBounds, LatLng};
use crate::points::Point;

/// Zoom used when the camera centres on a single point
pub const DETAIL_ZOOM: f64 = 14.0;
/// Screen padding around fitted bounds, in surface pixels
pub const FIT_PADDING: f64 = 50.0;
/// Upper zoom limit when fitting to a boundary outline
pub const BOUNDARY_MAX_ZOOM: f64 = 12.0;
/// Overview shown when nothing is active
pub const DEFAULT_CENTER: LatLng = LatLng::new(20.5937, 78.9629);
pub const DEFAULT_ZOOM: f64 = 5.0;

/// Camera instruction for the host. Zoom levels follow the usual slippy-map
/// convention: each level doubles the scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CameraCommand {
    DefaultOverview,
    CenterZoom {
        center: LatLng,
        zoom: f64,
    },
    FitBounds {
        bounds: GeoBounds,
        padding: f64,
        max_zoom: Option<f64>,
    },
}

impl CameraCommand {
    pub fn center_on(center: LatLng) -> Self {
        Self::CenterZoom {
            center,
            zoom: DETAIL_ZOOM,
        }
    }

    /// Fit to a boundary outline, capped at `BOUNDARY_MAX_ZOOM`
    pub fn fit_boundary(bounds: GeoBounds) -> Self {
        Self::FitBounds {
            bounds,
            padding: FIT_PADDING,
            max_zoom: Some(BOUNDARY_MAX_ZOOM),
        }
    }
}

/// Pure mapping from a set of points to a camera command
#[derive(Clone, Copy, Debug, Default)]
pub struct ViewportFitter;

impl ViewportFitter {
    pub fn fit<'a, I>(&self, points: I) -> CameraCommand
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return CameraCommand::DefaultOverview;
        };
        let Some(second) = iter.next() else {
            return CameraCommand::center_on(first.position);
        };

        let mut bounds = GeoBounds::from_corners(first.position, second.position);
        for p in iter {
            bounds.extend(p.position);
        }
        CameraCommand::FitBounds {
            bounds,
            padding: FIT_PADDING,
            max_zoom: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_store;

    #[test]
    fn test_zero_points() {
        assert_eq!(ViewportFitter.fit(std::iter::empty()), CameraCommand::DefaultOverview);
    }

    #[test]
    fn test_one_point() {
        let store = sample_store();
        let pune = store.find_city("pune").unwrap();
        assert_eq!(
            ViewportFitter.fit([pune]),
            CameraCommand::CenterZoom {
                center: pune.position,
                zoom: DETAIL_ZOOM
            }
        );
    }

    #[test]
    fn test_many_points_bounds() {
        let store = sample_store();
        let a = store.find_city("Ahmedabad").unwrap();
        let j = store.find_city("Jaipur").unwrap();
        let CameraCommand::FitBounds { bounds, padding, max_zoom } = ViewportFitter.fit([a, j]) else {
            panic!("expected FitBounds");
        };
        assert_eq!(padding, FIT_PADDING);
        assert_eq!(max_zoom, None);
        assert_eq!(bounds.south_west(), LatLng::new(23.0225, 72.5714));
        assert_eq!(bounds.north_east(), LatLng::new(26.9160, 75.8284));
    }

    #[test]
    fn test_deterministic() {
        let store = sample_store();
        assert_eq!(ViewportFitter.fit(store.iter()), ViewportFitter.fit(store.iter()));
    }
}
