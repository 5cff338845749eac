use glam::DVec2;

/// A geographic coordinate in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True for finite coordinates inside the valid lat/lng ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// (lng, lat) as a vector, x = longitude
    #[inline(always)]
    pub fn to_vec(self) -> DVec2 {
        DVec2::new(self.lng, self.lat)
    }

    #[inline(always)]
    pub fn from_vec(v: DVec2) -> Self {
        Self { lat: v.y, lng: v.x }
    }
}

/// Axis-aligned lat/lng bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    /// South-west corner (min lng, min lat)
    min: DVec2,
    /// North-east corner (max lng, max lat)
    max: DVec2,
}

impl GeoBounds {
    pub fn from_corners(south_west: LatLng, north_east: LatLng) -> Self {
        let a = south_west.to_vec();
        let b = north_east.to_vec();
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every coordinate, `None` for an empty input
    pub fn enclosing<I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut iter = coords.into_iter();
        let first = iter.next()?.to_vec();
        let (min, max) = iter.fold((first, first), |(min, max), c| {
            let v = c.to_vec();
            (min.min(v), max.max(v))
        });
        Some(Self { min, max })
    }

    pub fn south_west(&self) -> LatLng {
        LatLng::from_vec(self.min)
    }

    pub fn north_east(&self) -> LatLng {
        LatLng::from_vec(self.max)
    }

    pub fn center(&self) -> LatLng {
        LatLng::from_vec((self.min + self.max) * 0.5)
    }

    /// Span in degrees as (lng, lat)
    pub fn span(&self) -> DVec2 {
        self.max - self.min
    }

    pub fn contains(&self, c: LatLng) -> bool {
        let v = c.to_vec();
        v.cmpge(self.min).all() && v.cmple(self.max).all()
    }

    /// Matches Leaflet's `isValid`: finite corners with max >= min
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.max.cmpge(self.min).all()
    }

    pub fn extend(&mut self, c: LatLng) {
        let v = c.to_vec();
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing_empty() {
        assert!(GeoBounds::enclosing(std::iter::empty()).is_none());
    }

    #[test]
    fn test_enclosing_points() {
        let b = GeoBounds::enclosing([
            LatLng::new(23.0225, 72.5714),
            LatLng::new(26.9160, 75.8284),
        ])
        .unwrap();
        assert_eq!(b.south_west(), LatLng::new(23.0225, 72.5714));
        assert_eq!(b.north_east(), LatLng::new(26.9160, 75.8284));
        assert!(b.contains(LatLng::new(25.0, 74.0)));
        assert!(!b.contains(LatLng::new(28.0, 74.0)));
    }

    #[test]
    fn test_single_point_bounds_are_valid() {
        let p = LatLng::new(18.5204, 73.8567);
        let b = GeoBounds::enclosing([p]).unwrap();
        assert!(b.is_valid());
        assert_eq!(b.center(), p);
        assert_eq!(b.span(), DVec2::ZERO);
    }

    #[test]
    fn test_invalid_coordinate() {
        assert!(!LatLng::new(91.0, 0.0).is_valid());
        assert!(!LatLng::new(0.0, f64::NAN).is_valid());
        assert!(LatLng::new(-33.9, 151.2).is_valid());
    }
}
