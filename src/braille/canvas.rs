/// Braille Unicode canvas for terminal graphics.
/// Each character cell holds a 2x4 dot grid (U+2800 to U+28FF).
pub struct BrailleCanvas {
    cols: usize,
    rows: usize,
    cells: Vec<u8>,
}

/// Dot bit for (x % 2, y % 4):
/// ```text
/// 0x01 0x08
/// 0x02 0x10
/// 0x04 0x20
/// 0x40 0x80
/// ```
const DOT_BITS: [[u8; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];

impl BrailleCanvas {
    /// Canvas of `cols` x `rows` characters, `cols*2` x `rows*4` dots
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![0; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Dot resolution as (width, height)
    pub fn pixel_size(&self) -> (usize, usize) {
        (self.cols * 2, self.rows * 4)
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Set one dot. Out-of-range coordinates are ignored.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        let (cx, cy) = (x / 2, y / 4);
        if cx >= self.cols || cy >= self.rows {
            return;
        }
        self.cells[cy * self.cols + cx] |= DOT_BITS[x % 2][y % 4];
    }

    /// Bresenham line between two dots
    pub fn line(&mut self, (x0, y0): (i32, i32), (x1, y1): (i32, i32)) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.set(x, y);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                if x == x1 {
                    break;
                }
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                if y == y1 {
                    break;
                }
                err += dx;
                y += sy;
            }
        }
    }

    /// Doubled line, used for outlines that need to stand out
    pub fn thick_line(&mut self, a: (i32, i32), b: (i32, i32)) {
        self.line(a, b);
        self.line((a.0 + 1, a.1), (b.0 + 1, b.1));
        self.line((a.0, a.1 + 1), (b.0, b.1 + 1));
    }

    /// Filled disc
    pub fn disc(&mut self, cx: i32, cy: i32, radius: i32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set(cx + dx, cy + dy);
                }
            }
        }
    }

    /// Character at a cell, `None` when the cell is blank or out of range
    pub fn glyph(&self, col: usize, row: usize) -> Option<char> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        match self.cells[row * self.cols + col] {
            0 => None,
            bits => char::from_u32(0x2800 + bits as u32),
        }
    }

    pub fn row_to_string(&self, row: usize) -> String {
        if row >= self.rows {
            return String::new();
        }
        self.cells[row * self.cols..(row + 1) * self.cols]
            .iter()
            .map(|&b| char::from_u32(0x2800 + b as u32).unwrap_or(' '))
            .collect()
    }
}
