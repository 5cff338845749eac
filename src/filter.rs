//! The single active filter dimension and its point predicate.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::InputError;
use crate::points::{canonical_city, Point, PointId, PointStore};

/// Non-empty, case-insensitively deduplicated set of category names
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategorySet {
    /// lowercase key -> display name
    names: BTreeMap<String, String>,
}

impl CategorySet {
    pub fn contains(&self, category: &str) -> bool {
        self.names.contains_key(&category.trim().to_lowercase())
    }

    /// Display names in key order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn insert(&mut self, name: &str) {
        let name = name.trim();
        self.names
            .entry(name.to_lowercase())
            .or_insert_with(|| name.to_string());
    }
}

/// Which dimension currently governs visibility
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    None,
    City,
    Categories,
    Search,
}

/// Exactly one active dimension. Selecting one clears the other two.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FilterState {
    #[default]
    AllActive,
    /// Display name of the city as it appears in the dataset
    CityActive(String),
    CategoryActive(CategorySet),
    /// Trimmed query text
    SearchActive(String),
}

impl FilterState {
    /// `None` or blank clears the filter; unknown cities are rejected.
    pub fn for_city(store: &PointStore, city: Option<&str>) -> Result<Self, InputError> {
        let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(Self::AllActive);
        };
        store
            .find_city(city)
            .map(|p| Self::CityActive(p.city.clone()))
            .ok_or_else(|| InputError::UnknownCity(city.to_string()))
    }

    /// Empty input clears the filter. Categories absent from the dataset are
    /// dropped; if nothing is left the input is rejected.
    pub fn for_categories<I, S>(store: &PointStore, categories: I) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = store.categories();
        let mut set = CategorySet::default();
        let mut unknown = Vec::new();
        let mut requested = 0usize;

        for category in categories {
            let category = category.as_ref().trim();
            if category.is_empty() {
                continue;
            }
            requested += 1;
            let key = category.to_lowercase();
            match known.iter().find(|k| k.to_lowercase() == key) {
                Some(display) => set.insert(display),
                None => unknown.push(category.to_string()),
            }
        }

        if requested == 0 {
            return Ok(Self::AllActive);
        }
        if set.is_empty() {
            return Err(InputError::NoKnownCategories(unknown));
        }
        Ok(Self::CategoryActive(set))
    }

    /// Blank queries are rejected; the caller falls back to `AllActive`.
    pub fn for_search(query: &str) -> Result<Self, InputError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(InputError::EmptyQuery);
        }
        Ok(Self::SearchActive(query.to_string()))
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Self::AllActive => Dimension::None,
            Self::CityActive(_) => Dimension::City,
            Self::CategoryActive(_) => Dimension::Categories,
            Self::SearchActive(_) => Dimension::Search,
        }
    }

    pub fn city(&self) -> Option<&str> {
        match self {
            Self::CityActive(city) => Some(city),
            _ => None,
        }
    }

    pub fn categories(&self) -> Option<&CategorySet> {
        match self {
            Self::CategoryActive(set) => Some(set),
            _ => None,
        }
    }

    pub fn search(&self) -> Option<&str> {
        match self {
            Self::SearchActive(query) => Some(query),
            _ => None,
        }
    }

    pub fn matches(&self, point: &Point) -> bool {
        match self {
            Self::AllActive => true,
            Self::CityActive(city) => canonical_city(&point.city) == canonical_city(city),
            Self::CategoryActive(set) => !point.category.is_empty() && set.contains(&point.category),
            Self::SearchActive(query) => search_matches(point, &query.to_lowercase()),
        }
    }

    /// Points matching this state, in dataset order
    pub fn active_points<'a>(&self, store: &'a PointStore) -> Vec<&'a Point> {
        store.iter().filter(|p| self.matches(p)).collect()
    }

    /// Whether `id` belongs to the active set without materializing it
    pub fn admits(&self, store: &PointStore, id: &PointId) -> bool {
        store.get(id).is_some_and(|p| self.matches(p))
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllActive => f.write_str("all"),
            Self::CityActive(city) => write!(f, "city: {city}"),
            Self::CategoryActive(set) => {
                f.write_str("categories: ")?;
                for (i, name) in set.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name)?;
                }
                Ok(())
            }
            Self::SearchActive(query) => write!(f, "search: {query:?}"),
        }
    }
}

/// Case-insensitive substring match over city, region, category and
/// localized name. `needle` must already be lowercase.
#[inline]
pub fn search_matches(point: &Point, needle: &str) -> bool {
    [
        point.city.as_str(),
        point.region.as_str(),
        point.category.as_str(),
        point.localized_name.as_str(),
    ]
    .iter()
    .any(|field| !field.is_empty() && field.to_lowercase().contains(needle))
}
