//! City boundary outlines: asynchronous fetch, supersession, render/clear.
//!
//! Every `load` or `clear` bumps the request counter. A completion is applied
//! only when its request id is still the latest one; anything older is
//! dropped silently. There is no abort of the underlying fetch.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use geojson::{GeoJson, Geometry, Value};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use crate::error::FetchError;
use crate::geo::{GeoBounds, LatLng};
use crate::surface::Surface;
use crate::viewport::CameraCommand;

/// Boundary file name exceptions, applied after lowercasing
const SLUG_EXCEPTIONS: &[(&str, &str)] = &[("surat", "surat_fixed")];
/// Substrings that route a name to the `delhi` outline
const DELHI_MARKERS: &[&str] = &["delhi", "ncr"];

/// Normalized boundary file stem for a city name: lowercased, trimmed,
/// spaces preserved, aliases and file exceptions applied.
pub fn boundary_slug(city: &str) -> String {
    let lower = city.trim().to_lowercase();
    if DELHI_MARKERS.iter().any(|m| lower.contains(m)) {
        return "delhi".to_string();
    }
    SLUG_EXCEPTIONS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, file)| (*file).to_string())
        .unwrap_or(lower)
}

/// Outline geometry of one region
#[derive(Clone, Debug, PartialEq)]
pub struct Boundary {
    /// Label from `properties.name`
    pub name: Option<String>,
    /// Every polygon ring, exterior and holes
    pub rings: Vec<Vec<LatLng>>,
    pub bounds: GeoBounds,
}

impl Boundary {
    /// Accepts a Feature, FeatureCollection or bare geometry of Polygon /
    /// MultiPolygon type.
    pub fn from_geojson(slug: &str, geojson: &GeoJson) -> Result<Self, FetchError> {
        let mut name = None;
        let mut rings = Vec::new();

        match geojson {
            GeoJson::FeatureCollection(fc) => {
                for feature in &fc.features {
                    if name.is_none() {
                        name = feature_name(feature);
                    }
                    if let Some(ref geometry) = feature.geometry {
                        collect_rings(slug, geometry, &mut rings)?;
                    }
                }
            }
            GeoJson::Feature(f) => {
                name = feature_name(f);
                if let Some(ref geometry) = f.geometry {
                    collect_rings(slug, geometry, &mut rings)?;
                }
            }
            GeoJson::Geometry(geometry) => collect_rings(slug, geometry, &mut rings)?,
        }

        let bounds = GeoBounds::enclosing(rings.iter().flatten().copied())
            .ok_or_else(|| FetchError::Empty { slug: slug.to_string() })?;
        Ok(Self { name, rings, bounds })
    }
}

fn feature_name(feature: &geojson::Feature) -> Option<String> {
    feature
        .property("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn collect_rings(slug: &str, geometry: &Geometry, rings: &mut Vec<Vec<LatLng>>) -> Result<(), FetchError> {
    let to_ring = |coords: &Vec<Vec<f64>>| -> Vec<LatLng> {
        coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| LatLng::new(c[1], c[0]))
            .collect()
    };

    match &geometry.value {
        Value::Polygon(polygon) => {
            rings.extend(polygon.iter().map(to_ring).filter(|r| r.len() >= 2));
        }
        Value::MultiPolygon(polygons) => {
            for polygon in polygons {
                rings.extend(polygon.iter().map(to_ring).filter(|r| r.len() >= 2));
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_rings(slug, g, rings)?;
            }
        }
        other => {
            return Err(FetchError::UnsupportedGeometry {
                slug: slug.to_string(),
                kind: geometry_kind(other),
            })
        }
    }
    Ok(())
}

fn geometry_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Read `<root>/<slug>.geojson`
pub fn read_boundary_file(root: &Path, slug: &str) -> Result<Boundary, FetchError> {
    let path = root.join(format!("{slug}.geojson"));
    let content = fs::read_to_string(&path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => FetchError::NotFound { slug: slug.to_string() },
        _ => FetchError::Io { path: path.clone(), source },
    })?;
    let geojson: GeoJson = content.parse().map_err(|source| FetchError::Parse {
        slug: slug.to_string(),
        source: Box::new(source),
    })?;
    Boundary::from_geojson(slug, &geojson)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundaryStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Published boundary state. At most one city at a time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundaryState {
    pub requested_city: Option<String>,
    pub status: BoundaryStatus,
    pub geometry: Option<Arc<Boundary>>,
    /// Message of the last failure while `status == Error`
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundaryRequest {
    pub id: u64,
    pub city: String,
    pub slug: String,
}

#[derive(Debug)]
pub struct BoundaryResponse {
    pub request: u64,
    pub result: Result<Boundary, FetchError>,
}

pub type BoundaryReply = UnboundedSender<BoundaryResponse>;

/// External loader collaborator. Implementations must eventually send exactly
/// one response per request on `reply`, from any thread.
pub trait BoundaryFetcher {
    fn fetch(&self, request: BoundaryRequest, reply: BoundaryReply);
}

/// Reads boundary files from a directory on the rayon pool
#[derive(Clone, Debug)]
pub struct FileBoundaryFetcher {
    root: PathBuf,
}

impl FileBoundaryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BoundaryFetcher for FileBoundaryFetcher {
    fn fetch(&self, request: BoundaryRequest, reply: BoundaryReply) {
        let root = self.root.clone();
        rayon::spawn(move || {
            let result = read_boundary_file(&root, &request.slug);
            // Receiver gone means the session ended
            let _ = reply.send(BoundaryResponse {
                request: request.id,
                result,
            });
        });
    }
}

/// What a `poll` applied
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PollOutcome {
    /// State changed and should be republished
    pub changed: bool,
    /// Camera fit for a freshly loaded outline
    pub camera: Option<CameraCommand>,
}

pub struct BoundaryLoader<F> {
    fetcher: F,
    latest: u64,
    state: BoundaryState,
    reply: BoundaryReply,
    completions: UnboundedReceiver<BoundaryResponse>,
}

impl<F: BoundaryFetcher> BoundaryLoader<F> {
    pub fn new(fetcher: F) -> Self {
        let (reply, completions) = mpsc::unbounded_channel();
        Self {
            fetcher,
            latest: 0,
            state: BoundaryState::default(),
            reply,
            completions,
        }
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Id of the most recently issued request
    pub fn latest_request(&self) -> u64 {
        self.latest
    }

    /// Replace whatever is shown with the outline for `city`. A blank name
    /// behaves like `clear`.
    pub fn load<S: Surface + ?Sized>(&mut self, city: &str, surface: &mut S) {
        let city = city.trim();
        if city.is_empty() {
            warn!("boundary load without a city, clearing instead");
            self.clear(surface);
            return;
        }

        let slug = boundary_slug(city);
        self.reset(surface);
        self.latest += 1;
        self.state.requested_city = Some(city.to_string());
        self.state.status = BoundaryStatus::Loading;

        debug!(request = self.latest, %city, %slug, "boundary requested");
        self.fetcher.fetch(
            BoundaryRequest {
                id: self.latest,
                city: city.to_string(),
                slug,
            },
            self.reply.clone(),
        );
    }

    /// Remove any outline and discard the effect of in-flight requests
    pub fn clear<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        if self.state.status != BoundaryStatus::Idle || self.state.geometry.is_some() {
            debug!(request = self.latest, "boundary cleared");
        }
        self.reset(surface);
        self.latest += 1;
    }

    fn reset<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        if self.state.geometry.is_some() || self.state.status != BoundaryStatus::Idle {
            surface.clear_boundary();
        }
        self.state = BoundaryState::default();
    }

    /// Apply completions that arrived since the last call
    pub fn poll<S: Surface + ?Sized>(&mut self, surface: &mut S) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        loop {
            match self.completions.try_recv() {
                Ok(response) => self.apply(response, surface, &mut outcome),
                Err(TryRecvError::Empty) => break,
                // The loader keeps a sender alive, so this cannot happen
                Err(TryRecvError::Disconnected) => break,
            }
        }
        outcome
    }

    fn apply<S: Surface + ?Sized>(
        &mut self,
        response: BoundaryResponse,
        surface: &mut S,
        outcome: &mut PollOutcome,
    ) {
        if response.request != self.latest || self.state.status != BoundaryStatus::Loading {
            trace!(
                request = response.request,
                latest = self.latest,
                "discarding superseded boundary response"
            );
            return;
        }

        let city = self.state.requested_city.clone().unwrap_or_default();
        match response.result {
            Ok(boundary) => {
                info!(%city, rings = boundary.rings.len(), "boundary loaded");
                surface.show_boundary(&boundary);
                if boundary.bounds.is_valid() {
                    outcome.camera = Some(CameraCommand::fit_boundary(boundary.bounds));
                }
                self.state.status = BoundaryStatus::Loaded;
                self.state.geometry = Some(Arc::new(boundary));
                self.state.error = None;
            }
            Err(err) => {
                warn!(%city, error = %err, "boundary unavailable");
                surface.clear_boundary();
                self.state.status = BoundaryStatus::Error;
                self.state.geometry = None;
                self.state.error = Some(err.to_string());
            }
        }
        outcome.changed = true;
    }
}
