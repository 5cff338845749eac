use std::collections::HashMap;

use crate::geo::LatLng;

/// Spatial hash grid over geographic positions. Answers "what is near this
/// coordinate" without scanning every item.
pub struct SpatialGrid<T> {
    /// Item indices per (cell_x, cell_y)
    cells: HashMap<(i32, i32), Vec<usize>>,
    items: Vec<(LatLng, T)>,
    /// Cell size in degrees
    cell_size: f64,
}

impl<T> SpatialGrid<T> {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            items: Vec::new(),
            cell_size,
        }
    }

    #[inline(always)]
    fn to_cell(&self, c: LatLng) -> (i32, i32) {
        let x = (c.lng / self.cell_size).floor() as i32;
        let y = (c.lat / self.cell_size).floor() as i32;
        (x, y)
    }

    pub fn insert(&mut self, at: LatLng, item: T) {
        let idx = self.items.len();
        self.items.push((at, item));
        let cell = self.to_cell(at);
        self.cells.entry(cell).or_default().push(idx);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.items.clear();
    }

    /// Items whose cell lies within `radius` degrees of `at`. Conservative:
    /// callers filter by exact distance.
    pub fn query_radius(&self, at: LatLng, radius: f64) -> impl Iterator<Item = &(LatLng, T)> {
        let (cx, cy) = self.to_cell(at);
        let r = (radius / self.cell_size).ceil() as i32;

        (cy - r..=cy + r)
            .flat_map(move |y| (cx - r..=cx + r).map(move |x| (x, y)))
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .map(|&idx| &self.items[idx])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
