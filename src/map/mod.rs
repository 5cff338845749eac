mod projection;
mod renderer;
mod spatial;

pub use projection::{Viewport, MAX_ZOOM, MIN_ZOOM, WORLD_DOTS, ZOOM_STEP};
pub use renderer::{
    DisplaySettings, LineString, MapLayers, MapSurface, MarkerGlyph, MarkerSprite, HIT_RADIUS_DOTS,
};
pub use spatial::SpatialGrid;
