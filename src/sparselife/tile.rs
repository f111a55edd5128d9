//! Tile data structures for SparseLife.
//!
//! A tile covers a `width x height` block of the world. Its cells live in two
//! padded buffers borrowed from the slab: one extra ghost cell on every side
//! caches the adjoining neighbor's border, so the rule never special-cases
//! edges. Exactly one buffer is current; `step` writes the other and flips.

use super::slab::AlignedBuffer;
use super::sync::GhostZone;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIdx(pub u32);

impl TileIdx {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The 8 directions for neighbor addressing. `y` grows downward.
///
/// The declaration order is load-bearing: the reflection of index `i` is
/// index `7 - i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    TopLeft     = 0, // (-1, -1)
    Top         = 1, // ( 0, -1)
    TopRight    = 2, // ( 1, -1)
    Left        = 3, // (-1,  0)
    Right       = 4, // ( 1,  0)
    BottomLeft  = 5, // (-1,  1)
    Bottom      = 6, // ( 0,  1)
    BottomRight = 7, // ( 1,  1)
}

impl Direction {
    pub const COUNT: usize = 8;

    pub const ALL: [Direction; 8] = [
        Direction::TopLeft,    Direction::Top,    Direction::TopRight,
        Direction::Left,                          Direction::Right,
        Direction::BottomLeft, Direction::Bottom, Direction::BottomRight,
    ];

    /// The unit offset for this direction.
    #[inline]
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Direction::TopLeft     => (-1, -1),
            Direction::Top         => (0, -1),
            Direction::TopRight    => (1, -1),
            Direction::Left        => (-1, 0),
            Direction::Right       => (1, 0),
            Direction::BottomLeft  => (-1, 1),
            Direction::Bottom      => (0, 1),
            Direction::BottomRight => (1, 1),
        }
    }

    /// The same edge as seen from the neighbor.
    #[inline]
    pub const fn reflect(self) -> Direction {
        Self::ALL[Self::COUNT - 1 - self as usize]
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn is_diagonal(self) -> bool {
        let (dx, dy) = self.offset();
        dx != 0 && dy != 0
    }

    /// Inverse of [`Direction::offset`]. `(0, 0)` and offsets outside
    /// `{-1, 0, 1}` are programmer errors.
    pub fn from_offset(dx: i64, dy: i64) -> Direction {
        const LUT: [[Option<Direction>; 3]; 3] = [
            [Some(Direction::TopLeft),    Some(Direction::Top),    Some(Direction::TopRight)],
            [Some(Direction::Left),       None,                    Some(Direction::Right)],
            [Some(Direction::BottomLeft), Some(Direction::Bottom), Some(Direction::BottomRight)],
        ];
        assert!(
            (-1..=1).contains(&dx) && (-1..=1).contains(&dy),
            "neighbor offset ({dx}, {dy}) is not a unit offset"
        );
        LUT[(dy + 1) as usize][(dx + 1) as usize]
            .unwrap_or_else(|| panic!("(0, 0) is not a neighbor offset"))
    }
}

/// Neighbor handles for a tile, indexed by `Direction`.
pub type Neighbors = [Option<TileIdx>; 8];

pub const EMPTY_NEIGHBORS: Neighbors = [None; 8];

/// An axis-aligned rectangle in world space: `[x_min, x_min + width) x [y_min, y_min + height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileBounds {
    pub x_min: i64,
    pub width: i64,
    pub y_min: i64,
    pub height: i64,
}

impl TileBounds {
    pub const fn new(x_min: i64, width: i64, y_min: i64, height: i64) -> Self {
        Self {
            x_min,
            width,
            y_min,
            height,
        }
    }

    #[inline]
    pub const fn x_max(&self) -> i64 {
        self.x_min + self.width
    }

    #[inline]
    pub const fn y_max(&self) -> i64 {
        self.y_min + self.height
    }

    #[inline]
    pub const fn coord(&self) -> (i64, i64) {
        (self.x_min, self.y_min)
    }

    #[inline]
    pub const fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x_min && x < self.x_max() && y >= self.y_min && y < self.y_max()
    }
}

/// Bytes needed for a padded `width x height` cell buffer.
#[inline]
pub fn padded_len(width: i64, height: i64) -> usize {
    ((width + 2) * (height + 2)) as usize
}

/// A run of cells inside a padded buffer: `count` cells starting at `start`,
/// `stride` apart.
#[derive(Clone, Copy, Debug)]
struct Run {
    start: usize,
    stride: usize,
    count: usize,
}

/// A fixed-size rectangular chunk of the world with double-buffered cells.
pub struct Tile {
    bounds: TileBounds,
    /// Padded row length, `width + 2`.
    stride: usize,
    padded_len: usize,
    generation: u64,
    cells: [AlignedBuffer; 2],
    phase: u8,
    population: u32,
    /// World coordinates of live interior cells as of the last step or rebuild.
    live_cells: Vec<(i64, i64)>,
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("bounds", &self.bounds)
            .field("generation", &self.generation)
            .field("phase", &self.phase)
            .field("population", &self.population)
            .finish()
    }
}

impl Tile {
    /// Build a tile over `bounds` on top of two slab buffers.
    ///
    /// Panics if either dimension is not positive or a buffer cannot hold the
    /// padded grid.
    pub fn new(bounds: TileBounds, cells: [AlignedBuffer; 2], generation: u64) -> Self {
        assert!(bounds.width > 0, "tile width is not positive ({})", bounds.width);
        assert!(bounds.height > 0, "tile height is not positive ({})", bounds.height);
        let padded = padded_len(bounds.width, bounds.height);
        assert!(
            cells[0].len() >= padded && cells[1].len() >= padded,
            "tile buffers hold {} / {} bytes, {padded} needed",
            cells[0].len(),
            cells[1].len()
        );
        Self {
            bounds,
            stride: (bounds.width + 2) as usize,
            padded_len: padded,
            generation,
            cells,
            phase: 0,
            population: 0,
            live_cells: Vec::new(),
        }
    }

    /// Give the buffers back, e.g. to return them to the slab.
    pub fn into_buffers(self) -> [AlignedBuffer; 2] {
        self.cells
    }

    #[inline]
    pub fn bounds(&self) -> TileBounds {
        self.bounds
    }

    #[inline]
    pub fn coord(&self) -> (i64, i64) {
        self.bounds.coord()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Live interior cells as of the last `step` (or `rebuild_live_cells`).
    #[inline]
    pub fn population(&self) -> u32 {
        self.population
    }

    #[inline]
    pub fn live_cells(&self) -> &[(i64, i64)] {
        &self.live_cells
    }

    #[inline]
    fn width(&self) -> usize {
        self.bounds.width as usize
    }

    #[inline]
    fn height(&self) -> usize {
        self.bounds.height as usize
    }

    /// Padded current buffer, exactly `(width + 2) * (height + 2)` bytes.
    #[inline]
    pub fn padded_current(&self) -> &[u8] {
        &self.cells[self.phase as usize].as_slice()[..self.padded_len]
    }

    /// Padded buffer of the previous generation.
    #[inline]
    pub fn padded_previous(&self) -> &[u8] {
        &self.cells[1 - self.phase as usize].as_slice()[..self.padded_len]
    }

    #[inline]
    fn current_mut(&mut self) -> &mut [u8] {
        let len = self.padded_len;
        &mut self.cells[self.phase as usize].as_mut_slice()[..len]
    }

    #[inline]
    fn current_and_next_mut(&mut self) -> (&[u8], &mut [u8]) {
        let len = self.padded_len;
        let (a, b) = self.cells.split_at_mut(1);
        if self.phase == 0 {
            (&a[0].as_slice()[..len], &mut b[0].as_mut_slice()[..len])
        } else {
            (&b[0].as_slice()[..len], &mut a[0].as_mut_slice()[..len])
        }
    }

    #[inline]
    fn swap(&mut self) {
        self.phase ^= 1;
    }

    /// Buffer offset of world cell `(x, y)`; the ghost margin is addressable.
    #[inline]
    fn offset(&self, x: i64, y: i64) -> usize {
        let b = &self.bounds;
        assert!(
            x >= b.x_min - 1 && x <= b.x_max() && y >= b.y_min - 1 && y <= b.y_max(),
            "cell ({x}, {y}) is outside tile ({}, {}) and its ghost margin",
            b.x_min,
            b.y_min
        );
        (x - b.x_min + 1) as usize + self.stride * (y - b.y_min + 1) as usize
    }

    pub fn raise(&mut self, x: i64, y: i64) {
        let offset = self.offset(x, y);
        self.current_mut()[offset] = 1;
    }

    pub fn kill(&mut self, x: i64, y: i64) {
        let offset = self.offset(x, y);
        self.current_mut()[offset] = 0;
    }

    pub fn is_alive(&self, x: i64, y: i64) -> bool {
        self.padded_current()[self.offset(x, y)] != 0
    }

    #[inline(always)]
    fn local(&self, px: usize, py: usize) -> u8 {
        self.padded_current()[px + self.stride * py]
    }

    /// Padded-buffer run covering this tile's cells on `side`: the ghost
    /// cells when `ghost` is set, otherwise the interior edge cells.
    fn side_run(&self, side: Direction, ghost: bool) -> Run {
        let (w, h) = (self.width(), self.height());
        let depth = if ghost { 0 } else { 1 };
        let (dx, dy) = side.offset();
        let px = match dx {
            -1 => depth,
            1 => w + 1 - depth,
            _ => 1,
        };
        let py = match dy {
            -1 => depth,
            1 => h + 1 - depth,
            _ => 1,
        };
        let start = px + self.stride * py;
        match (dx, dy) {
            (0, _) => Run { start, stride: 1, count: w },
            (_, 0) => Run { start, stride: self.stride, count: h },
            _ => Run { start, stride: 1, count: 1 },
        }
    }

    /// Copy this tile's interior edge on `side` out of `buffer` into `out`.
    fn read_edge(&self, side: Direction, buffer: &[u8], out: &mut Vec<u8>) {
        let run = self.side_run(side, false);
        out.clear();
        if run.stride == 1 {
            out.extend_from_slice(&buffer[run.start..run.start + run.count]);
        } else {
            out.extend((0..run.count).map(|i| buffer[run.start + i * run.stride]));
        }
    }

    /// Overwrite the ghost cells on `side` of the current buffer.
    fn write_ghost(&mut self, side: Direction, data: &[u8]) {
        let run = self.side_run(side, true);
        assert_eq!(
            data.len(),
            run.count,
            "border for {side:?} of tile ({}, {}) has mismatched length",
            self.bounds.x_min,
            self.bounds.y_min
        );
        let cells = self.current_mut();
        if run.stride == 1 {
            cells[run.start..run.start + run.count].copy_from_slice(data);
        } else {
            for (i, &cell) in data.iter().enumerate() {
                cells[run.start + i * run.stride] = cell;
            }
        }
    }

    /// The buffer holding generation `wanted` for a neighbor pulling borders.
    ///
    /// A neighbor that already stepped past `wanted` serves its previous
    /// buffer; one that lags a single generation serves its latest completed
    /// one. Any larger skew is a topology bug.
    pub fn border_source(&self, wanted: u64) -> &[u8] {
        if self.generation == wanted || self.generation + 1 == wanted {
            self.padded_current()
        } else if self.generation == wanted + 1 {
            self.padded_previous()
        } else {
            panic!(
                "tile ({}, {}) at generation {} cannot supply generation {wanted}",
                self.bounds.x_min, self.bounds.y_min, self.generation
            );
        }
    }

    /// Copy this tile's border facing `side` as of generation `wanted` into `out`.
    pub fn read_border(&self, side: Direction, wanted: u64, out: &mut Vec<u8>) {
        self.read_edge(side, self.border_source(wanted), out);
    }

    /// Write every gathered ghost line into the current buffer.
    pub fn apply_ghosts(&mut self, ghost: &GhostZone) {
        for side in Direction::ALL {
            if let Some(line) = ghost.line(side) {
                self.write_ghost(side, line);
            }
        }
    }

    /// Seed the ghost cells on `side` from `other`'s facing border.
    pub fn copy_border_from(&mut self, other: &Tile, side: Direction) {
        let mut line = Vec::new();
        other.read_edge(side.reflect(), other.padded_current(), &mut line);
        self.write_ghost(side, &line);
    }

    /// Zero the ghost cells on `side` in both buffers.
    pub fn clear_ghost(&mut self, side: Direction) {
        let run = self.side_run(side, true);
        let len = self.padded_len;
        for buffer in &mut self.cells {
            let cells = &mut buffer.as_mut_slice()[..len];
            for i in 0..run.count {
                cells[run.start + i * run.stride] = 0;
            }
        }
    }

    /// Advance one generation using the neighbor borders in `incoming`.
    /// Returns the new interior population.
    pub fn step(&mut self, incoming: &GhostZone) -> u32 {
        self.apply_ghosts(incoming);

        let (w, h, stride) = (self.width(), self.height(), self.stride);
        let (current, next) = self.current_and_next_mut();
        for py in 1..=h {
            let above = &current[(py - 1) * stride..py * stride];
            let row = &current[py * stride..(py + 1) * stride];
            let below = &current[(py + 1) * stride..(py + 2) * stride];
            let out = &mut next[py * stride..(py + 1) * stride];
            for px in 1..=w {
                let neighbors = above[px - 1]
                    + above[px]
                    + above[px + 1]
                    + row[px - 1]
                    + row[px + 1]
                    + below[px - 1]
                    + below[px]
                    + below[px + 1];
                out[px] = match (row[px] != 0, neighbors) {
                    (true, 2) | (_, 3) => 1,
                    _ => 0,
                };
            }
        }

        self.swap();
        self.generation += 1;
        self.rebuild_live_cells();
        self.population
    }

    /// Recompute the live-cell cache and population from the current buffer.
    pub fn rebuild_live_cells(&mut self) {
        let (w, h, stride) = (self.width(), self.height(), self.stride);
        let (x_min, y_min) = self.coord();
        let mut live = std::mem::take(&mut self.live_cells);
        live.clear();
        let cells = self.padded_current();
        for py in 1..=h {
            let row = &cells[py * stride..(py + 1) * stride];
            for px in 1..=w {
                if row[px] != 0 {
                    live.push((x_min + px as i64 - 1, y_min + py as i64 - 1));
                }
            }
        }
        self.population = live.len() as u32;
        self.live_cells = live;
    }

    /// True if any ghost cell of the current buffer is live.
    pub fn has_border_cells(&self) -> bool {
        let (w, h, stride) = (self.width(), self.height(), self.stride);
        let cells = self.padded_current();
        let top = &cells[..stride];
        let bottom = &cells[(h + 1) * stride..(h + 2) * stride];
        top.iter().chain(bottom).any(|&c| c != 0)
            || (1..=h).any(|py| cells[py * stride] != 0 || cells[py * stride + w + 1] != 0)
    }

    /// Whether the currently missing neighbor on `direction` could see a birth
    /// next generation.
    ///
    /// Cardinal sides scan the edge row/column extended by one ghost cell at
    /// each end: any window of three cells that touches a boundary cell of the
    /// missing tile fires at three live cells. The two end windows also count
    /// the corner ghost and, when the diagonal neighbor exists, its unobserved
    /// cell as live. Diagonals fire if any of the three cells that touch the
    /// missing corner is live.
    pub fn would_spawn_neighbor(&self, direction: Direction, neighbors: &Neighbors) -> bool {
        if neighbors[direction.index()].is_some() {
            return false;
        }

        let (w, h) = (self.width(), self.height());
        let (dx, dy) = direction.offset();

        if direction.is_diagonal() {
            let px = if dx < 0 { 1 } else { w };
            let py = if dy < 0 { 1 } else { h };
            let ghost_x = (px as i64 + dx) as usize;
            let ghost_y = (py as i64 + dy) as usize;
            return self.local(px, py) != 0
                || self.local(ghost_x, py) != 0
                || self.local(px, ghost_y) != 0;
        }

        // `cell(i, false)` walks the edge line including its ghost ends,
        // i in 0..=n+1; `cell(i, true)` is the ghost cell just beyond it.
        let horizontal = dy != 0;
        let (n, depth) = if horizontal { (h, dy) } else { (w, dx) };
        let cell = |along: usize, beyond: bool| -> u8 {
            let across = match (depth < 0, beyond) {
                (true, false) => 1,
                (true, true) => 0,
                (false, false) => n,
                (false, true) => n + 1,
            };
            if horizontal {
                self.local(along, across)
            } else {
                self.local(across, along)
            }
        };
        let (len, start_diag, end_diag) = if horizontal {
            (w, Direction::from_offset(-1, dy), Direction::from_offset(1, dy))
        } else {
            (h, Direction::from_offset(dx, -1), Direction::from_offset(dx, 1))
        };

        let start_extra = cell(0, true) + neighbors[start_diag.index()].is_some() as u8;
        let end_extra = cell(len + 1, true) + neighbors[end_diag.index()].is_some() as u8;

        (1..=len).any(|c| {
            let mut live = cell(c - 1, false) + cell(c, false) + cell(c + 1, false);
            if c == 1 {
                live += start_extra;
            }
            if c == len {
                live += end_extra;
            }
            live >= 3
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparselife::slab::{SlabAllocator, TILE_ALIGN};

    fn slab_for(width: i64, height: i64) -> SlabAllocator {
        SlabAllocator::new(padded_len(width, height).next_multiple_of(TILE_ALIGN), 8)
    }

    fn new_tile(slab: &mut SlabAllocator, x: i64, y: i64, w: i64, h: i64) -> Tile {
        Tile::new(
            TileBounds::new(x, w, y, h),
            [slab.allocate(), slab.allocate()],
            0,
        )
    }

    fn live_set(tile: &Tile) -> Vec<(i64, i64)> {
        let mut cells = tile.live_cells().to_vec();
        cells.sort_unstable();
        cells
    }

    fn sorted(cells: &[(i64, i64)]) -> Vec<(i64, i64)> {
        let mut cells = cells.to_vec();
        cells.sort_unstable();
        cells
    }

    #[test]
    fn reflection_is_index_mirror() {
        for d in Direction::ALL {
            assert_eq!(d.reflect().index(), 7 - d.index());
            assert_eq!(d.reflect().reflect(), d);
            let (dx, dy) = d.offset();
            assert_eq!(d.reflect().offset(), (-dx, -dy));
            assert_eq!(Direction::from_offset(dx, dy), d);
        }
    }

    #[test]
    #[should_panic(expected = "not a neighbor offset")]
    fn zero_offset_is_rejected() {
        let _ = Direction::from_offset(0, 0);
    }

    #[test]
    fn raise_kill_round_trip() {
        let mut slab = slab_for(8, 8);
        let mut tile = new_tile(&mut slab, 16, -8, 8, 8);
        tile.raise(17, -5);
        assert!(tile.is_alive(17, -5));
        tile.kill(17, -5);
        assert!(!tile.is_alive(17, -5));
        // Ghost margin is addressable.
        tile.raise(15, -9);
        assert!(tile.is_alive(15, -9));
        assert!(tile.has_border_cells());
    }

    #[test]
    #[should_panic(expected = "outside tile")]
    fn out_of_range_access_panics() {
        let mut slab = slab_for(8, 8);
        let tile = new_tile(&mut slab, 0, 0, 8, 8);
        tile.is_alive(9, 0);
    }

    #[test]
    #[should_panic(expected = "width is not positive")]
    fn zero_width_panics() {
        let mut slab = slab_for(8, 8);
        let _ = Tile::new(
            TileBounds::new(0, 0, 0, 8),
            [slab.allocate(), slab.allocate()],
            0,
        );
    }

    #[test]
    fn block_is_still_life() {
        let mut slab = slab_for(8, 8);
        let mut tile = new_tile(&mut slab, 0, 0, 8, 8);
        let block = [(3, 3), (4, 3), (3, 4), (4, 4)];
        for &(x, y) in &block {
            tile.raise(x, y);
        }
        let ghost = GhostZone::new();
        for generation in 1..=5 {
            assert_eq!(tile.step(&ghost), 4);
            assert_eq!(tile.generation(), generation);
            assert_eq!(live_set(&tile), sorted(&block));
        }
    }

    #[test]
    fn blinker_oscillates_and_buffers_ping_pong() {
        let mut slab = slab_for(8, 8);
        let mut tile = new_tile(&mut slab, 0, 0, 8, 8);
        for x in 2..=4 {
            tile.raise(x, 4);
        }
        let ghost = GhostZone::new();
        let first = tile.padded_current().as_ptr();

        tile.step(&ghost);
        assert_eq!(live_set(&tile), vec![(3, 3), (3, 4), (3, 5)]);
        assert_ne!(tile.padded_current().as_ptr(), first);
        assert_eq!(tile.padded_previous().as_ptr(), first);

        tile.step(&ghost);
        assert_eq!(live_set(&tile), vec![(2, 4), (3, 4), (4, 4)]);
        assert_eq!(tile.padded_current().as_ptr(), first);
    }

    #[test]
    fn glider_moves_one_cell_diagonally_every_four_steps() {
        let mut slab = slab_for(16, 16);
        let mut tile = new_tile(&mut slab, 0, 0, 16, 16);
        let glider = [(2, 1), (3, 2), (1, 3), (2, 3), (3, 3)];
        for &(x, y) in &glider {
            tile.raise(x, y);
        }
        let ghost = GhostZone::new();
        for _ in 0..4 {
            tile.step(&ghost);
        }
        let shifted: Vec<_> = glider.iter().map(|&(x, y)| (x + 1, y + 1)).collect();
        assert_eq!(live_set(&tile), sorted(&shifted));
    }

    #[test]
    fn ghost_cells_feed_the_rule() {
        let mut slab = slab_for(4, 4);
        let mut tile = new_tile(&mut slab, 0, 0, 4, 4);
        // A vertical blinker centered on the ghost column x = -1.
        let mut ghost = GhostZone::new();
        ghost.set_line(Direction::Left, &[1, 1, 1, 0]);
        tile.step(&ghost);
        // (0, 1) sees (-1, 0), (-1, 1), (-1, 2): born.
        assert!(tile.is_alive(0, 1));
        assert_eq!(tile.population(), 1);
    }

    #[test]
    fn cardinal_prediction_needs_three_in_a_row() {
        let mut slab = slab_for(8, 8);
        let mut tile = new_tile(&mut slab, 0, 0, 8, 8);
        tile.raise(3, 0);
        tile.raise(4, 0);
        assert!(!tile.would_spawn_neighbor(Direction::Top, &EMPTY_NEIGHBORS));
        tile.raise(5, 0);
        assert!(tile.would_spawn_neighbor(Direction::Top, &EMPTY_NEIGHBORS));
        assert!(!tile.would_spawn_neighbor(Direction::Bottom, &EMPTY_NEIGHBORS));

        let mut neighbors = EMPTY_NEIGHBORS;
        neighbors[Direction::Top.index()] = Some(TileIdx(9));
        assert!(!tile.would_spawn_neighbor(Direction::Top, &neighbors));
    }

    #[test]
    fn cardinal_prediction_counts_ghost_line_ends() {
        let mut slab = slab_for(8, 8);
        let mut tile = new_tile(&mut slab, 0, 0, 8, 8);
        // Two live edge cells plus the left ghost cell on the same row.
        tile.raise(-1, 7);
        tile.raise(0, 7);
        tile.raise(1, 7);
        assert!(tile.would_spawn_neighbor(Direction::Bottom, &EMPTY_NEIGHBORS));
    }

    #[test]
    fn cardinal_end_window_counts_corner_and_diagonal() {
        let mut slab = slab_for(8, 8);
        let mut tile = new_tile(&mut slab, 0, 0, 8, 8);
        tile.raise(7, 0);
        tile.raise(8, -1); // top-right corner ghost
        assert!(!tile.would_spawn_neighbor(Direction::Top, &EMPTY_NEIGHBORS));

        let mut neighbors = EMPTY_NEIGHBORS;
        neighbors[Direction::TopRight.index()] = Some(TileIdx(3));
        assert!(tile.would_spawn_neighbor(Direction::Top, &neighbors));
    }

    #[test]
    fn end_windows_follow_the_edge_length_on_wide_tiles() {
        let mut slab = slab_for(8, 4);
        let mut tile = new_tile(&mut slab, 0, 0, 8, 4);
        tile.raise(6, 0);
        tile.raise(8, -1); // top-right corner ghost

        let mut neighbors = EMPTY_NEIGHBORS;
        neighbors[Direction::TopRight.index()] = Some(TileIdx(3));
        assert!(tile.would_spawn_neighbor(Direction::Top, &neighbors));

        // A window in the middle of the edge gets no corner credit.
        tile.kill(6, 0);
        tile.raise(3, 0);
        assert!(!tile.would_spawn_neighbor(Direction::Top, &neighbors));
    }

    #[test]
    fn end_windows_follow_the_edge_length_on_tall_tiles() {
        let mut slab = slab_for(4, 8);
        let mut tile = new_tile(&mut slab, 0, 0, 4, 8);
        tile.raise(0, 7);
        tile.raise(-1, 8); // bottom-left corner ghost
        assert!(!tile.would_spawn_neighbor(Direction::Left, &EMPTY_NEIGHBORS));

        let mut neighbors = EMPTY_NEIGHBORS;
        neighbors[Direction::BottomLeft.index()] = Some(TileIdx(5));
        assert!(tile.would_spawn_neighbor(Direction::Left, &neighbors));
    }

    #[test]
    fn diagonal_prediction_is_conservative() {
        let mut slab = slab_for(8, 8);
        let mut tile = new_tile(&mut slab, 0, 0, 8, 8);
        assert!(!tile.would_spawn_neighbor(Direction::BottomRight, &EMPTY_NEIGHBORS));
        tile.raise(7, 7);
        assert!(tile.would_spawn_neighbor(Direction::BottomRight, &EMPTY_NEIGHBORS));
        assert!(!tile.would_spawn_neighbor(Direction::TopLeft, &EMPTY_NEIGHBORS));
        tile.kill(7, 7);
        tile.raise(8, 7); // right ghost beside the corner
        assert!(tile.would_spawn_neighbor(Direction::BottomRight, &EMPTY_NEIGHBORS));
    }

    #[test]
    fn border_copy_and_clear() {
        let mut slab = slab_for(4, 4);
        let mut left = new_tile(&mut slab, 0, 0, 4, 4);
        let mut right = new_tile(&mut slab, 4, 0, 4, 4);
        left.raise(3, 1);
        left.raise(3, 2);

        right.copy_border_from(&left, Direction::Left);
        assert!(right.is_alive(3, 1));
        assert!(right.is_alive(3, 2));
        assert!(!right.is_alive(3, 0));
        assert!(right.has_border_cells());

        right.clear_ghost(Direction::Left);
        assert!(!right.has_border_cells());
    }

    #[test]
    fn border_source_follows_generation_skew() {
        let mut slab = slab_for(4, 4);
        let mut tile = new_tile(&mut slab, 0, 0, 4, 4);
        tile.raise(0, 0);
        tile.raise(1, 0);
        tile.raise(2, 0);
        let before = tile.padded_current().to_vec();
        tile.step(&GhostZone::new());

        assert_eq!(tile.border_source(0), &before[..]);
        assert_eq!(tile.border_source(1), tile.padded_current());
        assert_eq!(tile.border_source(2), tile.padded_current());
    }

    #[test]
    #[should_panic(expected = "cannot supply generation")]
    fn border_source_rejects_large_skew() {
        let mut slab = slab_for(4, 4);
        let tile = new_tile(&mut slab, 0, 0, 4, 4);
        tile.border_source(5);
    }
}
