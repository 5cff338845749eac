use std::path::PathBuf;

use clap::Parser;

use crate::geo::LatLng;

/// Command-line configuration. Paths and the locate position can also come
/// from the environment.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Explore points of interest on a terminal map")]
pub struct Config {
    /// JSON array of point records (built-in dataset when absent)
    #[arg(long, env = "POI_MAP_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Directory holding `<slug>.geojson` boundary files
    #[arg(long, env = "POI_MAP_BOUNDARIES", default_value = "data/boundary")]
    pub boundaries: PathBuf,

    /// GeoJSON file or directory drawn as the background outline
    #[arg(long, env = "POI_MAP_BASEMAP")]
    pub basemap: Option<PathBuf>,

    /// Where the session log is written
    #[arg(long, env = "POI_MAP_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Position reported by geolocation, as LAT,LNG
    #[arg(long, env = "POI_MAP_LOCATE_AT", value_parser = parse_lat_lng)]
    pub locate_at: Option<LatLng>,

    /// City selected at start-up
    #[arg(long)]
    pub city: Option<String>,

    /// Run the search headless, print the result and exit
    #[arg(long)]
    pub query: Option<String>,
}

fn parse_lat_lng(s: &str) -> Result<LatLng, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("longitude: {e}"))?;
    let position = LatLng::new(lat, lng);
    if !position.is_valid() {
        return Err(format!("{lat},{lng} is outside the valid range"));
    }
    Ok(position)
}
