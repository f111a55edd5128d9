use std::collections::HashSet;

use proptest::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use sparse_life::sparselife::{Direction, TileBounds};
use sparse_life::{SparseGrid, SparseGridConfig};

fn collect_live(grid: &SparseGrid) -> HashSet<(i64, i64)> {
    let mut out = HashSet::new();
    grid.for_each_live(|x, y| {
        out.insert((x, y));
    });
    out
}

fn assert_alive(grid: &SparseGrid, cells: &[(i64, i64)]) {
    for &(x, y) in cells {
        assert!(grid.is_alive(x, y), "expected alive at ({x},{y})");
    }
}

fn assert_dead(grid: &SparseGrid, cells: &[(i64, i64)]) {
    for &(x, y) in cells {
        assert!(!grid.is_alive(x, y), "expected dead at ({x},{y})");
    }
}

fn wrap(world: &TileBounds, (x, y): (i64, i64)) -> (i64, i64) {
    (
        world.x_min + (x - world.x_min).rem_euclid(world.width),
        world.y_min + (y - world.y_min).rem_euclid(world.height),
    )
}

/// One generation of B3/S23 on the torus `world`.
fn step_naive_torus(cells: &HashSet<(i64, i64)>, world: &TileBounds) -> HashSet<(i64, i64)> {
    let mut next = HashSet::new();
    let mut candidates = HashSet::new();
    for &(x, y) in cells {
        for dy in -1..=1 {
            for dx in -1..=1 {
                candidates.insert(wrap(world, (x + dx, y + dy)));
            }
        }
    }

    for (x, y) in candidates {
        let mut neighbors = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if cells.contains(&wrap(world, (x + dx, y + dy))) {
                    neighbors += 1;
                }
            }
        }
        let alive = cells.contains(&(x, y));
        let next_alive = if alive {
            neighbors == 2 || neighbors == 3
        } else {
            neighbors == 3
        };
        if next_alive {
            next.insert((x, y));
        }
    }

    next
}

fn random_cells(seed: u64, range: std::ops::Range<i64>, density: f64) -> Vec<(i64, i64)> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut cells = Vec::new();
    for y in range.clone() {
        for x in range.clone() {
            if rng.random::<f64>() < density {
                cells.push((x, y));
            }
        }
    }
    cells
}

fn assert_topology(grid: &SparseGrid) {
    grid.adjacency()
        .verify_symmetry()
        .unwrap_or_else(|err| panic!("generation {}: {err}", grid.generation()));
    assert_eq!(grid.adjacency().len(), grid.tile_count());
    for tile in grid.tiles() {
        assert_eq!(tile.generation(), grid.generation());
    }
}

#[test]
fn block_is_stable() {
    let block = [(0, 0), (1, 0), (0, 1), (1, 1)];
    let mut grid = SparseGrid::with_config(block, SparseGridConfig::default().world_extent(2, 2));

    grid.advance_generation();

    assert_alive(&grid, &block);
    assert_dead(&grid, &[(2, 0), (2, 1), (-1, 0), (-1, 1)]);
}

#[test]
fn blinker_oscillates() {
    let mut grid = SparseGrid::new([(4, 4), (5, 4), (6, 4)]);

    grid.advance_generation();
    assert_alive(&grid, &[(5, 3), (5, 4), (5, 5)]);
    assert_dead(&grid, &[(4, 4), (6, 4)]);

    grid.advance_generation();
    assert_alive(&grid, &[(4, 4), (5, 4), (6, 4)]);
    assert_dead(&grid, &[(5, 3), (5, 5)]);
}

#[test]
fn blinker_wraps_across_the_world_edge() {
    let seed = [(62, 5), (63, 5), (0, 5)];
    let mut grid = SparseGrid::new(seed);
    assert_eq!(grid.bounds(), TileBounds::new(0, 64, 0, 32));

    grid.advance_generation();
    assert_eq!(
        collect_live(&grid),
        [(63, 4), (63, 5), (63, 6)].into_iter().collect()
    );

    grid.advance_generation();
    assert_eq!(collect_live(&grid), seed.into_iter().collect());
    assert_topology(&grid);
}

#[test]
fn glider_crosses_into_a_new_tile_and_vacates_the_old_one() {
    let glider = [(27, 8), (28, 9), (26, 10), (27, 10), (28, 10)];
    let mut grid = SparseGrid::with_config(glider, SparseGridConfig::default().world_extent(4, 4));
    let world = grid.bounds();
    assert_eq!(world, TileBounds::new(0, 128, 0, 128));

    let mut naive: HashSet<_> = glider.into_iter().collect();
    let mut max_tiles = grid.tile_count();
    let mut saw_right_tile = false;
    for _ in 0..60 {
        grid.advance_generation();
        naive = step_naive_torus(&naive, &world);
        assert_eq!(collect_live(&grid), naive, "generation {}", grid.generation());
        assert_topology(&grid);

        max_tiles = max_tiles.max(grid.tile_count());
        saw_right_tile |= grid.tile_at((32, 0)).is_some();
    }

    assert!(saw_right_tile);
    assert_eq!(max_tiles, 2);
    assert_eq!(grid.tile_count(), 1);
    let survivor = grid.tiles().next().expect("one tile left");
    assert_eq!(survivor.bounds().coord(), (32, 0));
    assert_eq!(survivor.population(), 5);

    let shifted: Vec<_> = glider.iter().map(|&(x, y)| (x + 15, y + 15)).collect();
    assert_alive(&grid, &shifted);
}

#[test]
fn matches_naive_torus_on_random_soup() {
    let seed = random_cells(0xBADC0FFEE, 0..64, 0.33);
    let config = SparseGridConfig::default().tile_size(16, 16).world_extent(4, 4);
    let mut grid = SparseGrid::with_config(seed.clone(), config);
    let world = grid.bounds();
    assert_eq!(world, TileBounds::new(0, 64, 0, 64));

    let mut naive: HashSet<_> = seed.into_iter().collect();
    for _ in 0..40 {
        assert_eq!(collect_live(&grid), naive, "generation {}", grid.generation());
        assert_eq!(grid.population(), naive.len() as u64);
        grid.advance_generation();
        naive = step_naive_torus(&naive, &world);
    }
}

#[test]
fn sparse_soup_grows_into_empty_space() {
    // A small soup in a large, mostly empty world: tiles appear and vanish.
    let seed: Vec<_> = random_cells(0x5EED_CAFE, 0..24, 0.4)
        .into_iter()
        .map(|(x, y)| (x - 12, y - 12))
        .collect();
    let config = SparseGridConfig::default().tile_size(8, 8).world_extent(12, 12);
    let mut grid = SparseGrid::with_config(seed.clone(), config);
    let world = grid.bounds();
    assert_eq!((world.width, world.height), (96, 96));

    let mut naive: HashSet<_> = seed.into_iter().collect();
    for _ in 0..80 {
        grid.advance_generation();
        naive = step_naive_torus(&naive, &world);
        assert_eq!(collect_live(&grid), naive, "generation {}", grid.generation());
        assert_topology(&grid);
    }
}

#[test]
fn birth_at_the_far_end_of_a_wide_tile_edge() {
    // (7,-1) is born in the missing tile above (0,0), fed by the tile at its
    // top-right corner.
    let seed = [(6, 0), (8, -1), (8, -2)];
    let config = SparseGridConfig::default().tile_size(8, 4).world_extent(4, 4);
    let mut grid = SparseGrid::with_config(seed, config);
    let world = grid.bounds();
    assert_eq!(world, TileBounds::new(0, 32, -4, 16));

    grid.advance_generation();
    let naive = step_naive_torus(&seed.into_iter().collect(), &world);
    assert_eq!(collect_live(&grid), naive);
    assert_alive(&grid, &[(7, -1)]);
    assert!(grid.tile_at((0, -4)).is_some());
    assert_topology(&grid);
}

#[test]
fn matches_naive_torus_with_rectangular_tiles() {
    let seed = random_cells(0x7EC7_A61E, 0..64, 0.3);
    for (tile_w, tile_h) in [(16, 8), (8, 16)] {
        let config = SparseGridConfig::default()
            .tile_size(tile_w, tile_h)
            .world_extent(96 / tile_w, 96 / tile_h);
        let mut grid = SparseGrid::with_config(seed.clone(), config);
        let world = grid.bounds();
        assert_eq!((world.width, world.height), (96, 96));

        let mut naive: HashSet<_> = seed.iter().copied().collect();
        for _ in 0..60 {
            grid.advance_generation();
            naive = step_naive_torus(&naive, &world);
            assert_eq!(
                collect_live(&grid),
                naive,
                "{tile_w}x{tile_h} tiles, generation {}",
                grid.generation()
            );
            assert_topology(&grid);
        }
    }
}

#[test]
fn extinct_world_releases_every_tile() {
    let mut grid = SparseGrid::with_config(
        [(0, 0), (40, 40), (-20, 70)],
        SparseGridConfig::default().superblock_len(1),
    );
    assert_eq!(grid.slab().issued(), grid.tile_count() * 2);

    grid.step_n(3);
    assert_eq!(grid.population(), 0);
    assert_eq!(grid.tile_count(), 0);
    assert!(grid.adjacency().is_empty());
    assert_eq!(grid.live_bounds(), None);
    assert_eq!(grid.slab().issued(), 0);
    assert_eq!(grid.slab().superblock_count(), 1);
}

#[test]
fn tiles_report_bounds_and_live_cells() {
    let mut grid = SparseGrid::with_config(
        [(1, 1), (2, 1), (1, 2), (2, 2), (20, 20), (21, 20), (20, 21), (21, 21)],
        SparseGridConfig::default().tile_size(16, 16),
    );
    grid.step_n(2);

    let mut seen = Vec::new();
    for tile in grid.tiles() {
        let bounds = tile.bounds();
        for &(x, y) in tile.live_cells() {
            assert!(bounds.contains(x, y));
        }
        seen.push((bounds.coord(), tile.live_cells().len()));
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![((0, 0), 4), ((16, 16), 4)]);
}

#[test]
fn deterministic_across_thread_counts() {
    let initial = random_cells(0xD37E_A515, 0..96, 0.3);

    let run = |threads: usize| {
        let config = SparseGridConfig::default()
            .tile_size(16, 16)
            .world_extent(8, 8)
            .thread_count(threads)
            .parallel_min_tiles(4);
        let mut grid = SparseGrid::with_config(initial.clone(), config);
        grid.step_n(12);
        (grid.population(), collect_live(&grid), grid.tile_count())
    };

    let (pop1, live1, tiles1) = run(1);
    let (pop4, live4, tiles4) = run(4);

    assert_eq!(pop1, pop4);
    assert_eq!(live1, live4);
    assert_eq!(tiles1, tiles4);
}

#[test]
fn neighbor_slots_point_at_wrapped_tiles() {
    let seed = random_cells(0xA11_CE, 0..48, 0.35);
    let mut grid = SparseGrid::with_config(
        seed,
        SparseGridConfig::default().tile_size(16, 16).world_extent(4, 4),
    );
    grid.step_n(5);

    let world = grid.bounds();
    let index = grid.adjacency();
    let coords: std::collections::HashMap<_, _> = index.iter().map(|(c, idx, _)| (idx, c)).collect();
    for (coord, _, neighbors) in index.iter() {
        for direction in Direction::ALL {
            let (dx, dy) = direction.offset();
            let expected = wrap(&world, (coord.0 + dx * 16, coord.1 + dy * 16));
            match neighbors[direction.index()] {
                Some(other) => assert_eq!(coords[&other], expected),
                None => assert!(index.query(expected).is_none()),
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn adjacency_stays_symmetric(
        cells in proptest::collection::vec((0i64..40, 0i64..40), 1..80),
        generations in 1u64..16,
        tile_w in prop::sample::select(vec![4i64, 8, 12]),
    ) {
        let config = SparseGridConfig::default()
            .tile_size(tile_w, 16 - tile_w)
            .world_extent(48 / tile_w, 48 / (16 - tile_w));
        let mut grid = SparseGrid::with_config(cells.clone(), config);
        let world = grid.bounds();
        let mut naive: HashSet<_> = cells.into_iter().collect();

        for _ in 0..generations {
            grid.advance_generation();
            naive = step_naive_torus(&naive, &world);
            prop_assert!(grid.adjacency().verify_symmetry().is_ok());
            prop_assert_eq!(collect_live(&grid), naive.clone());
        }
    }
}
