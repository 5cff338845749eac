//! Dataset and basemap loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, Value};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::DatasetError;
use crate::geo::LatLng;
use crate::map::{LineString, MapSurface};
use crate::points::{PointRecord, PointStore};

/// The 22-city dataset shipped with the binary
const BUNDLED_POINTS: &str = include_str!("../../data/points.json");

/// Parse a JSON array of point records. `bytes` is used as scratch space.
pub fn parse_records(bytes: &mut [u8]) -> Result<Vec<PointRecord>, DatasetError> {
    Ok(simd_json::serde::from_slice(bytes)?)
}

pub fn builtin_store() -> Result<PointStore, DatasetError> {
    let mut bytes = BUNDLED_POINTS.as_bytes().to_vec();
    PointStore::from_records(parse_records(&mut bytes)?)
}

/// Load a dataset file, or the bundled one when `path` is `None`
pub fn load_dataset(path: Option<&Path>) -> Result<PointStore, DatasetError> {
    let Some(path) = path else {
        return builtin_store();
    };
    let mut bytes = fs::read(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let store = PointStore::from_records(parse_records(&mut bytes)?)?;
    info!(path = %path.display(), points = store.len(), "dataset loaded");
    Ok(store)
}

#[cfg(test)]
pub(crate) fn sample_store() -> PointStore {
    builtin_store().expect("bundled dataset is valid")
}

/// Load basemap lines from a GeoJSON file, or from every `.json` /
/// `.geojson` file in a directory. Files are parsed in parallel; unreadable
/// ones are skipped with a warning. Returns the number of lines added.
pub fn load_basemap(surface: &mut MapSurface, path: &Path) -> Result<usize> {
    let files: Vec<PathBuf> = if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .with_context(|| format!("reading basemap directory {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("json" | "geojson")))
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let parsed: Vec<Vec<LineString>> = files
        .par_iter()
        .filter_map(|path| match read_lines(path) {
            Ok(lines) => {
                debug!(path = %path.display(), lines = lines.len(), "basemap file parsed");
                Some(lines)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping basemap file");
                None
            }
        })
        .collect();

    let mut added = 0;
    for line in parsed.into_iter().flatten() {
        if surface.add_basemap_line(line) {
            added += 1;
        }
    }
    Ok(added)
}

fn read_lines(path: &Path) -> Result<Vec<LineString>> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content.parse()?;
    let mut lines = Vec::new();
    process_geojson_lines(&geojson, |line| lines.push(line));
    Ok(lines)
}

/// Walk GeoJSON and hand every line-like feature to `add_line`. Polygons
/// contribute their exterior ring.
fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => process_geometry_lines(geometry, &mut add_line),
    }
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    let to_line = |coords: &[Vec<f64>]| -> LineString {
        coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| LatLng::new(c[1], c[0]))
            .collect()
    };

    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => lines.iter().for_each(|l| add_line(to_line(l))),
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_line(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        Value::Point(_) | Value::MultiPoint(_) => {}
    }
}

/// Coarse outline of the Indian subcontinent for when no basemap is given
pub fn generate_simple_outline(surface: &mut MapSurface) {
    const OUTLINE: &[(f64, f64)] = &[
        (35.5, 74.0), (34.5, 78.5), (32.5, 79.5), (30.5, 81.0), (28.0, 84.0),
        (26.5, 88.0), (28.0, 89.0), (28.0, 92.0), (29.2, 96.0), (27.0, 97.0),
        (24.0, 94.2), (22.0, 92.7), (23.5, 91.2), (25.1, 89.9), (22.0, 89.0),
        (21.6, 87.2), (19.5, 85.0), (17.0, 82.3), (15.8, 80.5), (13.0, 80.3),
        (10.3, 79.8), (8.1, 77.5), (9.5, 76.3), (12.0, 75.0), (15.5, 73.8),
        (19.0, 72.8), (21.0, 72.6), (22.3, 69.5), (23.7, 68.2), (24.5, 71.0),
        (27.0, 70.5), (28.0, 72.0), (30.0, 73.5), (32.5, 74.6), (35.5, 74.0),
    ];
    surface.add_basemap_line(OUTLINE.iter().map(|&(lat, lng)| LatLng::new(lat, lng)).collect());
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_bundled_dataset() {
        let store = sample_store();
        assert_eq!(store.len(), 22);
        let pune = store.find_city("pune").unwrap();
        assert_eq!(pune.region, "Maharashtra");
        assert_eq!(pune.category, "Education");
        assert_eq!(pune.localized_name, "पुणे");
    }

    #[test]
    fn test_legacy_field_names_accepted() {
        let mut json = r#"[{"lat": 25.3176, "lng": 82.9739, "city": "Varanasi",
            "hindiName": "वाराणसी", "state": "Uttar Pradesh", "category": "Spiritual",
            "info": "Ghats", "image": "varanasi.jpg"}]"#
            .as_bytes()
            .to_vec();
        let records = parse_records(&mut json).unwrap();
        assert_eq!(records[0].localized_name, "वाराणसी");
        assert_eq!(records[0].region, "Uttar Pradesh");
        assert_eq!(records[0].summary, "Ghats");
        assert_eq!(records[0].image_ref, "varanasi.jpg");
    }

    #[test]
    fn test_load_dataset_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"lat": 18.5, "lng": 73.8, "city": "Pune"}}]"#).unwrap();
        let store = load_dataset(Some(file.path())).unwrap();
        assert_eq!(store.len(), 1);
        assert!(matches!(
            load_dataset(Some(Path::new("/nonexistent/points.json"))),
            Err(DatasetError::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_dataset_rejected() {
        let mut bytes = b"{not json".to_vec();
        assert!(matches!(parse_records(&mut bytes), Err(DatasetError::Parse(_))));
    }

    #[test]
    fn test_load_basemap_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("coast.geojson"),
            r#"{"type": "MultiLineString", "coordinates": [[[70, 20], [72, 21]], [[80, 10], [81, 12]]]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "nope").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut surface = MapSurface::new();
        assert_eq!(load_basemap(&mut surface, dir.path()).unwrap(), 2);
        assert!(surface.has_basemap());
    }

    #[test]
    fn test_load_basemap_counts_only_drawable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coast.geojson");
        fs::write(
            &path,
            r#"{"type": "MultiLineString", "coordinates": [[[70, 20], [72, 21]], [[80, 10]], []]}"#,
        )
        .unwrap();

        let mut surface = MapSurface::new();
        assert_eq!(load_basemap(&mut surface, &path).unwrap(), 1);
    }
}
