use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Deserialize;

use crate::error::DatasetError;
use crate::geo::LatLng;

/// Long-form city names that share identity with a short form.
/// Matched against the lowercased, trimmed name.
const CITY_ALIASES: &[(&str, &str)] = &[("new delhi", "delhi")];

/// Lowercased, trimmed, alias-resolved city key
pub fn canonical_city(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    CITY_ALIASES
        .iter()
        .find(|(long, _)| *long == lower)
        .map(|(_, short)| (*short).to_string())
        .unwrap_or(lower)
}

/// Stable point identity derived from the city name.
///
/// `PointId::from_city("New Delhi") == PointId::from_city("delhi")`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PointId(String);

impl PointId {
    pub fn from_city(city: &str) -> Self {
        Self(canonical_city(city))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One record of the dataset as it appears on disk
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRecord {
    pub lat: f64,
    pub lng: f64,
    pub city: String,
    #[serde(default, alias = "hindiName")]
    pub localized_name: String,
    #[serde(default, alias = "state")]
    pub region: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, alias = "info")]
    pub summary: String,
    #[serde(default, alias = "image")]
    pub image_ref: String,
}

/// A point of interest. Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub position: LatLng,
    pub city: String,
    pub localized_name: String,
    pub region: String,
    pub category: String,
    pub summary: String,
    pub image_ref: String,
}

impl Point {
    fn from_record(r: PointRecord) -> Result<Self, DatasetError> {
        let position = LatLng::new(r.lat, r.lng);
        if !position.is_valid() {
            return Err(DatasetError::InvalidCoordinate {
                city: r.city,
                lat: r.lat,
                lng: r.lng,
            });
        }
        Ok(Self {
            id: PointId::from_city(&r.city),
            position,
            city: r.city.trim().to_string(),
            localized_name: r.localized_name,
            region: r.region,
            category: r.category.trim().to_string(),
            summary: r.summary,
            image_ref: r.image_ref,
        })
    }

    /// Label for markers: the localized name when present
    pub fn title(&self) -> &str {
        if self.localized_name.is_empty() {
            &self.city
        } else {
            &self.localized_name
        }
    }
}

/// Append-only holder of the point dataset
#[derive(Debug, Default)]
pub struct PointStore {
    points: Vec<Point>,
    index: HashMap<PointId, usize>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = PointRecord>,
    {
        let mut store = Self::new();
        for record in records {
            store.push(record)?;
        }
        Ok(store)
    }

    /// Append one record. Ids are unique; a second point resolving to an
    /// existing id is rejected.
    pub fn push(&mut self, record: PointRecord) -> Result<&Point, DatasetError> {
        let point = Point::from_record(record)?;
        if self.index.contains_key(&point.id) {
            return Err(DatasetError::DuplicateId(point.id.0));
        }
        let idx = self.points.len();
        self.index.insert(point.id.clone(), idx);
        self.points.push(point);
        Ok(&self.points[idx])
    }

    pub fn get(&self, id: &PointId) -> Option<&Point> {
        self.index.get(id).map(|&idx| &self.points[idx])
    }

    /// Alias-tolerant lookup by any spelling of the city name
    pub fn find_city(&self, name: &str) -> Option<&Point> {
        self.get(&PointId::from_city(name))
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.index.contains_key(id)
    }

    /// All points in load order
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Unique display city names, sorted case-insensitively
    pub fn cities(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut cities: Vec<String> = self
            .points
            .iter()
            .filter(|p| seen.insert(p.id.clone()))
            .map(|p| p.city.clone())
            .collect();
        cities.sort_by_key(|c| c.to_lowercase());
        cities
    }

    /// Unique non-empty categories in first-seen order
    pub fn categories(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.points
            .iter()
            .map(|p| p.category.as_str())
            .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(city: &str, category: &str) -> PointRecord {
        PointRecord {
            lat: 20.0,
            lng: 77.0,
            city: city.to_string(),
            localized_name: String::new(),
            region: String::new(),
            category: category.to_string(),
            summary: String::new(),
            image_ref: String::new(),
        }
    }

    #[test]
    fn test_alias_resolves_to_same_id() {
        assert_eq!(PointId::from_city("New Delhi"), PointId::from_city("delhi"));
        assert_eq!(PointId::from_city("  PUNE "), PointId::from_city("pune"));
        assert_ne!(PointId::from_city("Pune"), PointId::from_city("Pimpri"));
    }

    #[test]
    fn test_find_city_is_alias_tolerant() {
        let store = PointStore::from_records([record("New Delhi", "Capital")]).unwrap();
        assert_eq!(store.find_city("Delhi").unwrap().city, "New Delhi");
        assert_eq!(store.find_city("new delhi").unwrap().city, "New Delhi");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = PointStore::from_records([record("New Delhi", "Capital"), record("Delhi", "X")])
            .unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateId(id) if id == "delhi"));
    }

    #[test]
    fn test_invalid_coordinate_rejected() {
        let mut bad = record("Nowhere", "X");
        bad.lat = 120.0;
        assert!(matches!(
            PointStore::from_records([bad]),
            Err(DatasetError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_categories_unique_in_first_seen_order() {
        let store = PointStore::from_records([
            record("A", "Heritage"),
            record("B", "Technology"),
            record("C", "heritage"),
            record("D", ""),
        ])
        .unwrap();
        assert_eq!(store.categories(), vec!["Heritage", "Technology"]);
    }

    #[test]
    fn test_cities_sorted() {
        let store = PointStore::from_records([record("pune", ""), record("Ahmedabad", "")]).unwrap();
        assert_eq!(store.cities(), vec!["Ahmedabad", "pune"]);
    }
}
