use log::{debug, trace, warn};
use rayon::prelude::*;
use std::sync::OnceLock;

use super::adjacency::AdjacencyIndex;
use super::arena::TileArena;
use super::dump::TileDumpSink;
use super::slab::{SlabAllocator, TILE_ALIGN};
use super::sync::{GhostZone, gather_ghost_zone};
use super::tile::{Direction, Tile, TileBounds, TileIdx, padded_len};
use super::tilemap::TileMap;

/// Tile count at or above which stepping runs on the rayon pool.
const PARALLEL_MIN_TILES: usize = 128;
const DEFAULT_TILE_SIZE: i64 = 32;
const DEFAULT_SUPERBLOCK_LEN: usize = 128;

static PHYSICAL_CORES: OnceLock<usize> = OnceLock::new();

#[inline]
fn physical_core_count() -> usize {
    *PHYSICAL_CORES.get_or_init(|| num_cpus::get_physical().max(1))
}

#[inline]
fn auto_pool_thread_count_for_physical(physical: usize) -> usize {
    let physical = physical.max(1);
    if physical <= 8 {
        physical
    } else {
        physical.div_ceil(2).max(6)
    }
}

/// Resolve the thread count from a config, falling back to auto-detect.
fn resolve_thread_count(config: &SparseGridConfig) -> usize {
    let mut threads = config
        .thread_count
        .unwrap_or_else(|| auto_pool_thread_count_for_physical(physical_core_count()));
    if let Some(cap) = config.max_threads {
        threads = threads.min(cap);
    }
    threads.max(1)
}

/// Configuration for a `SparseGrid`.
///
/// `SparseGridConfig::default()` gives 32x32 tiles, auto-detected threads and
/// a world sized to the seed. Customise via the builder methods.
#[derive(Clone, Debug)]
pub struct SparseGridConfig {
    pub tile_width: i64,
    pub tile_height: i64,
    /// Tile buffers per slab superblock.
    pub superblock_len: usize,
    /// Number of threads for the compute pool.
    /// `None` means auto-detect (physical cores, bandwidth capped).
    pub thread_count: Option<usize>,
    /// Hard upper bound on threads regardless of auto-detection.
    pub max_threads: Option<usize>,
    /// Tile count at which stepping switches to the thread pool.
    pub parallel_min_tiles: usize,
    /// Minimum world size in tiles, `(across, down)`.
    /// `None` sizes the world to the seed's tile bounding box.
    pub world_extent: Option<(i64, i64)>,
}

impl Default for SparseGridConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            superblock_len: DEFAULT_SUPERBLOCK_LEN,
            thread_count: None,
            max_threads: None,
            parallel_min_tiles: PARALLEL_MIN_TILES,
            world_extent: None,
        }
    }
}

impl SparseGridConfig {
    /// Tile dimensions in cells. Must be positive.
    pub fn tile_size(mut self, width: i64, height: i64) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn superblock_len(mut self, n: usize) -> Self {
        self.superblock_len = n.max(1);
        self
    }

    /// Set an explicit thread count for the compute pool.
    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = Some(n.max(1));
        self
    }

    /// Set a hard upper bound on threads.
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n.max(1));
        self
    }

    pub fn parallel_min_tiles(mut self, n: usize) -> Self {
        self.parallel_min_tiles = n;
        self
    }

    /// Grow the world to at least `tiles_x` by `tiles_y` tiles.
    pub fn world_extent(mut self, tiles_x: i64, tiles_y: i64) -> Self {
        self.world_extent = Some((tiles_x.max(1), tiles_y.max(1)));
        self
    }
}

/// Origin of the tile `direction` of `coord`, wrapped around the world.
#[inline]
fn wrap_tile_coord(
    world: &TileBounds,
    (x, y): (i64, i64),
    direction: Direction,
    tile_width: i64,
    tile_height: i64,
) -> (i64, i64) {
    let (dx, dy) = direction.offset();
    let wrap = |v: i64, step: i64, size: i64, min: i64, max: i64| {
        let next = v + step * size;
        if next < min {
            max - size
        } else if next >= max {
            min
        } else {
            next
        }
    };
    (
        wrap(x, dx, tile_width, world.x_min, world.x_max()),
        wrap(y, dy, tile_height, world.y_min, world.y_max()),
    )
}

/// Read-only view of one tile for renderers and exporters.
#[derive(Clone, Copy)]
pub struct TileView<'a> {
    tile: &'a Tile,
}

impl<'a> TileView<'a> {
    pub fn bounds(&self) -> TileBounds {
        self.tile.bounds()
    }

    pub fn generation(&self) -> u64 {
        self.tile.generation()
    }

    pub fn population(&self) -> u32 {
        self.tile.population()
    }

    pub fn live_cells(&self) -> &'a [(i64, i64)] {
        self.tile.live_cells()
    }
}

pub struct SparseGrid {
    /// Fixed at construction; both dimensions are tile multiples.
    world: TileBounds,
    tile_width: i64,
    tile_height: i64,
    generation: u64,
    arena: TileArena,
    index: AdjacencyIndex,
    slab: SlabAllocator,
    pool: rayon::ThreadPool,
    parallel_min_tiles: usize,
    sink: Option<Box<dyn TileDumpSink>>,
    /// Per-slot ghost zones for the two-pass gather/apply.
    ghosts: Vec<GhostZone>,
    scratch: GhostZone,
    /// `(tile, population)` for every tile stepped this generation.
    populations: Vec<(TileIdx, u32)>,
    /// Tiles created during expansion detection, not yet indexed.
    pending: Vec<Tile>,
    /// Coordinate to position in `pending`.
    pending_lookup: TileMap,
    order: Vec<TileIdx>,
}

impl SparseGrid {
    /// Build a grid from a non-empty seed of live cells with default config.
    pub fn new<I>(seed: I) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        Self::with_config(seed, SparseGridConfig::default())
    }

    pub fn with_config<I>(seed: I, config: SparseGridConfig) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        Self::build(seed, config, None)
    }

    /// Like [`SparseGrid::with_config`], reporting every stepped tile to `sink`.
    pub fn with_sink<I>(seed: I, config: SparseGridConfig, sink: Box<dyn TileDumpSink>) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        Self::build(seed, config, Some(sink))
    }

    fn build<I>(seed: I, config: SparseGridConfig, sink: Option<Box<dyn TileDumpSink>>) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let (w, h) = (config.tile_width, config.tile_height);
        assert!(w > 0, "tile width must be positive, got {w}");
        assert!(h > 0, "tile height must be positive, got {h}");

        let cells: Vec<(i64, i64)> = seed.into_iter().collect();
        assert!(!cells.is_empty(), "seed must contain at least one live cell");

        let snap = |(x, y): (i64, i64)| (x.div_euclid(w) * w, y.div_euclid(h) * h);
        let (mut min_x, mut min_y) = (i64::MAX, i64::MAX);
        let (mut max_x, mut max_y) = (i64::MIN, i64::MIN);
        for &cell in &cells {
            let (tx, ty) = snap(cell);
            min_x = min_x.min(tx);
            min_y = min_y.min(ty);
            max_x = max_x.max(tx);
            max_y = max_y.max(ty);
        }
        let mut world = TileBounds::new(min_x, max_x + w - min_x, min_y, max_y + h - min_y);
        if let Some((tiles_x, tiles_y)) = config.world_extent {
            world.width = world.width.max(tiles_x * w);
            world.height = world.height.max(tiles_y * h);
        }

        let threads = resolve_thread_count(&config);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("failed to build SparseGrid rayon thread pool");

        let sub_block = padded_len(w, h).next_multiple_of(TILE_ALIGN);
        let mut grid = Self {
            world,
            tile_width: w,
            tile_height: h,
            generation: 0,
            arena: TileArena::new(),
            index: AdjacencyIndex::new(),
            slab: SlabAllocator::new(sub_block, config.superblock_len.max(1)),
            pool,
            parallel_min_tiles: config.parallel_min_tiles,
            sink,
            ghosts: Vec::new(),
            scratch: GhostZone::new(),
            populations: Vec::new(),
            pending: Vec::new(),
            pending_lookup: TileMap::default(),
            order: Vec::new(),
        };

        for &(x, y) in &cells {
            let coord = snap((x, y));
            let idx = match grid.index.query(coord) {
                Some(idx) => idx,
                None => {
                    let tile = grid.new_tile(coord, 0);
                    let idx = grid.arena.insert(tile);
                    if let Err(err) = grid.index.add_tile(coord, idx) {
                        panic!("seeding tile failed: {err}");
                    }
                    idx
                }
            };
            grid.arena.tile_mut(idx).raise(x, y);
        }

        grid.relink_all();
        grid.settle_ghosts(false);
        for tile in grid.arena.slots_mut().iter_mut().flatten() {
            tile.rebuild_live_cells();
        }
        if grid.detect_expansion() > 0 {
            grid.integrate_pending();
        }

        debug!(
            "seeded {} cells into {} tiles; world {:?}, {} worker threads",
            cells.len(),
            grid.arena.len(),
            grid.world,
            threads
        );
        grid
    }

    fn new_tile(&mut self, (x, y): (i64, i64), generation: u64) -> Tile {
        let bounds = TileBounds::new(x, self.tile_width, y, self.tile_height);
        Tile::new(bounds, [self.slab.allocate(), self.slab.allocate()], generation)
    }

    #[inline]
    fn neighbor_coord(&self, coord: (i64, i64), direction: Direction) -> (i64, i64) {
        wrap_tile_coord(&self.world, coord, direction, self.tile_width, self.tile_height)
    }

    #[inline]
    fn run_parallel(&self) -> bool {
        self.pool.current_num_threads() > 1 && self.arena.len() >= self.parallel_min_tiles
    }

    /// Advance every tile one generation and update the topology.
    /// Always returns `true`; broken invariants panic.
    pub fn advance_generation(&mut self) -> bool {
        let parallel = self.run_parallel();
        self.populations.clear();
        if parallel {
            self.gather_ghosts(true);
            self.step_gathered();
        } else {
            self.step_serial();
        }
        // Every tile now holds generation + 1; refresh all ghosts from it.
        self.settle_ghosts(parallel);
        self.dump_stepped();

        let created = self.detect_expansion();
        let retired = self.retire_quiet_tiles();
        if created > 0 {
            self.integrate_pending();
        }

        self.generation += 1;
        debug!(
            "generation {}: {} tiles ({} created, {} retired), slab {} superblocks / {} buffers",
            self.generation,
            self.arena.len(),
            created,
            retired,
            self.slab.superblock_count(),
            self.slab.issued()
        );
        true
    }

    pub fn step_n(&mut self, n: u64) {
        for _ in 0..n {
            self.advance_generation();
        }
    }

    /// Pull border, evaluate, flip, then pull again: one tile at a time.
    fn step_serial(&mut self) {
        let mut order = std::mem::take(&mut self.order);
        self.arena.collect_indices(&mut order);
        for &idx in &order {
            let Some(&neighbors) = self.index.neighbors(idx) else {
                continue;
            };
            let generation = self.arena.tile(idx).generation();
            gather_ghost_zone(&self.arena, &neighbors, generation, &mut self.scratch);
            let population = self.arena.tile_mut(idx).step(&self.scratch);
            gather_ghost_zone(&self.arena, &neighbors, generation + 1, &mut self.scratch);
            self.arena.tile_mut(idx).apply_ghosts(&self.scratch);
            self.populations.push((idx, population));
        }
        self.order = order;
    }

    /// Fill `ghosts[i]` for every occupied slot, at the tile's own generation.
    fn gather_ghosts(&mut self, parallel: bool) {
        let slot_count = self.arena.slot_count();
        if self.ghosts.len() < slot_count {
            self.ghosts.resize_with(slot_count, GhostZone::new);
        }
        let arena = &self.arena;
        let index = &self.index;
        let gather = |i: usize, ghost: &mut GhostZone| {
            ghost.clear();
            let idx = TileIdx(i as u32);
            if let (Some(tile), Some(neighbors)) = (arena.get(idx), index.neighbors(idx)) {
                gather_ghost_zone(arena, neighbors, tile.generation(), ghost);
            }
        };
        let ghosts = &mut self.ghosts[..slot_count];
        if parallel {
            self.pool.install(|| {
                ghosts
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(i, ghost)| gather(i, ghost));
            });
        } else {
            for (i, ghost) in ghosts.iter_mut().enumerate() {
                gather(i, ghost);
            }
        }
    }

    /// Step every tile against the ghost zones from `gather_ghosts`.
    fn step_gathered(&mut self) {
        let ghosts = &self.ghosts;
        let slots = self.arena.slots_mut();
        let stepped: Vec<(TileIdx, u32)> = self.pool.install(|| {
            slots
                .par_iter_mut()
                .zip(ghosts.par_iter())
                .enumerate()
                .filter_map(|(i, (slot, ghost))| {
                    slot.as_mut()
                        .map(|tile| (TileIdx(i as u32), tile.step(ghost)))
                })
                .collect()
        });
        self.populations = stepped;
    }

    fn settle_ghosts(&mut self, parallel: bool) {
        self.gather_ghosts(parallel);
        let ghosts = &self.ghosts;
        let slots = self.arena.slots_mut();
        if parallel {
            self.pool.install(|| {
                slots
                    .par_iter_mut()
                    .zip(ghosts.par_iter())
                    .for_each(|(slot, ghost)| {
                        if let Some(tile) = slot {
                            tile.apply_ghosts(ghost);
                        }
                    });
            });
        } else {
            for (slot, ghost) in slots.iter_mut().zip(ghosts) {
                if let Some(tile) = slot {
                    tile.apply_ghosts(ghost);
                }
            }
        }
    }

    fn dump_stepped(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let mut failed = false;
        for &(idx, _) in &self.populations {
            let tile = self.arena.tile(idx);
            if let Err(err) = sink.tile_stepped(
                tile.generation(),
                tile.bounds(),
                tile.padded_previous(),
                tile.padded_current(),
            ) {
                warn!("tile dump failed, dropping sink: {err}");
                failed = true;
                break;
            }
        }
        if failed {
            self.sink = None;
        }
    }

    /// Queue a new tile for every missing neighbor some tile predicts a birth
    /// in. Returns how many were queued.
    fn detect_expansion(&mut self) -> usize {
        self.pending.clear();
        self.pending_lookup.clear();

        let mut order = std::mem::take(&mut self.order);
        self.arena.collect_indices(&mut order);
        for &idx in &order {
            let Some(&neighbors) = self.index.neighbors(idx) else {
                continue;
            };
            let tile = self.arena.tile(idx);
            for direction in Direction::ALL {
                if !tile.would_spawn_neighbor(direction, &neighbors) {
                    continue;
                }
                let coord = wrap_tile_coord(
                    &self.world,
                    tile.coord(),
                    direction,
                    self.tile_width,
                    self.tile_height,
                );
                if self.index.contains(coord) {
                    continue;
                }
                let slot = match self.pending_lookup.get(coord) {
                    Some(slot) => slot.index(),
                    None => {
                        let bounds =
                            TileBounds::new(coord.0, self.tile_width, coord.1, self.tile_height);
                        let cells = [self.slab.allocate(), self.slab.allocate()];
                        self.pending.push(Tile::new(bounds, cells, tile.generation()));
                        let slot = self.pending.len() - 1;
                        self.pending_lookup.insert(coord, TileIdx(slot as u32));
                        trace!("tile {:?} requests new neighbor {coord:?}", tile.coord());
                        slot
                    }
                };
                self.pending[slot].copy_border_from(tile, direction.reflect());
            }
        }
        self.order = order;
        self.pending.len()
    }

    /// Drop tiles that stepped to zero population with nothing live on their
    /// ghost margin. Returns how many were dropped.
    fn retire_quiet_tiles(&mut self) -> usize {
        let mut retired = 0;
        for i in 0..self.populations.len() {
            let (idx, population) = self.populations[i];
            let tile = self.arena.tile(idx);
            if population != 0 || tile.has_border_cells() {
                continue;
            }
            let coord = tile.coord();
            if let Err(err) = self.index.remove_tile(coord, &mut self.arena) {
                panic!("retiring tile {coord:?} failed: {err}");
            }
            let [front, back] = self.arena.release(idx).into_buffers();
            self.slab.free(front);
            self.slab.free(back);
            trace!("retired tile {coord:?}");
            retired += 1;
        }
        retired
    }

    /// Store and index the pending batch, then relink the whole lattice.
    fn integrate_pending(&mut self) {
        let mut batch = Vec::with_capacity(self.pending.len());
        for tile in self.pending.drain(..) {
            let coord = tile.coord();
            batch.push((coord, self.arena.insert(tile)));
        }
        self.pending_lookup.clear();
        if let Err(err) = self.index.add_tiles(&batch) {
            panic!("indexing {} new tiles failed: {err}", batch.len());
        }
        self.relink_all();
    }

    /// Link every indexed tile to every existing wrapped neighbor.
    fn relink_all(&mut self) {
        let coords: Vec<(i64, i64)> = self.index.iter().map(|(coord, _, _)| coord).collect();
        for coord in coords {
            for direction in Direction::ALL {
                let neighbor = self.neighbor_coord(coord, direction);
                if !self.index.contains(neighbor) {
                    continue;
                }
                if let Err(err) = self.index.add_edge(coord, neighbor, direction) {
                    panic!("linking {coord:?} to {neighbor:?} failed: {err}");
                }
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The toroidal world rectangle.
    pub fn bounds(&self) -> TileBounds {
        self.world
    }

    pub fn tile_count(&self) -> usize {
        self.arena.len()
    }

    pub fn population(&self) -> u64 {
        self.arena
            .iter()
            .map(|(_, tile)| tile.population() as u64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.population() == 0
    }

    /// Every stored tile, in handle order.
    pub fn tiles(&self) -> impl Iterator<Item = TileView<'_>> {
        self.arena.iter().map(|(_, tile)| TileView { tile })
    }

    pub fn tile_at(&self, coord: (i64, i64)) -> Option<TileView<'_>> {
        let idx = self.index.query(coord)?;
        self.arena.get(idx).map(|tile| TileView { tile })
    }

    pub fn adjacency(&self) -> &AdjacencyIndex {
        &self.index
    }

    pub fn slab(&self) -> &SlabAllocator {
        &self.slab
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Cell state at `(x, y)`, wrapped into the world first.
    pub fn is_alive(&self, x: i64, y: i64) -> bool {
        let w = &self.world;
        let x = w.x_min + (x - w.x_min).rem_euclid(w.width);
        let y = w.y_min + (y - w.y_min).rem_euclid(w.height);
        let coord = (
            x.div_euclid(self.tile_width) * self.tile_width,
            y.div_euclid(self.tile_height) * self.tile_height,
        );
        self.index
            .query(coord)
            .and_then(|idx| self.arena.get(idx))
            .is_some_and(|tile| tile.is_alive(x, y))
    }

    pub fn for_each_live<F: FnMut(i64, i64)>(&self, mut f: F) {
        for (_, tile) in self.arena.iter() {
            for &(x, y) in tile.live_cells() {
                f(x, y);
            }
        }
    }

    /// `(min_x, min_y, max_x, max_y)` over live cells, if any.
    pub fn live_bounds(&self) -> Option<(i64, i64, i64, i64)> {
        let mut min_x = i64::MAX;
        let mut min_y = i64::MAX;
        let mut max_x = i64::MIN;
        let mut max_y = i64::MIN;
        let mut seen = false;

        self.for_each_live(|x, y| {
            seen = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        });

        seen.then_some((min_x, min_y, max_x, max_y))
    }
}

impl Drop for SparseGrid {
    fn drop(&mut self) {
        for tile in self.arena.drain().chain(self.pending.drain(..)) {
            let [front, back] = tile.into_buffers();
            self.slab.free(front);
            self.slab.free(back);
        }
    }
}
