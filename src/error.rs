use std::path::PathBuf;

use thiserror::Error;

/// Boundary geometry could not be produced for a request.
///
/// Always recovered locally by the boundary loader: status goes to `Error`,
/// markers stay as they are.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no boundary file for {slug:?}")]
    NotFound { slug: String },
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid GeoJSON for {slug:?}")]
    Parse {
        slug: String,
        #[source]
        source: Box<geojson::Error>,
    },
    #[error("boundary for {slug:?} has unsupported geometry {kind}")]
    UnsupportedGeometry { slug: String, kind: &'static str },
    #[error("boundary for {slug:?} contains no rings")]
    Empty { slug: String },
}

/// The point dataset could not be loaded.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset is not a valid point array")]
    Parse(#[from] simd_json::Error),
    #[error("duplicate point id {0:?}")]
    DuplicateId(String),
    #[error("point {city:?} has invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { city: String, lat: f64, lng: f64 },
}

/// Rejected filter input. Never surfaced to callers of the coordinator;
/// logged and turned into the `AllActive` fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown city {0:?}")]
    UnknownCity(String),
    #[error("empty query")]
    EmptyQuery,
    #[error("none of the requested categories exist: {0:?}")]
    NoKnownCategories(Vec<String>),
}

/// Reported by the geolocation collaborator; the host may offer a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("geolocation is not supported")]
    Unsupported,
    #[error("geolocation permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for a position fix")]
    Timeout,
}
