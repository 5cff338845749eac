//! Point-of-interest map engine: city, category and search filters over a
//! fixed dataset, kept in sync with a marker layer and a city outline.

pub mod boundary;
pub mod braille;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod feed;
pub mod filter;
pub mod geo;
pub mod locate;
pub mod logging;
pub mod map;
pub mod markers;
pub mod points;
pub mod selection;
pub mod surface;
pub mod viewport;
