#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use rand::RngCore;
use rand::SeedableRng;
use sparse_life::{SparseGrid, SparseGridConfig, TextTileDump};
use std::time::Instant;

const SEED_SIDE: i64 = 512;
const LIVE_DENSITY: f64 = 0.35;
const TOTAL_ITERATIONS: u64 = 1000;
const CHECK_INTERVAL: u64 = 100;

struct MainArgs {
    config: SparseGridConfig,
    side: i64,
    generations: u64,
    dump: Option<String>,
}

fn parse_args() -> MainArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SparseGridConfig::default();
    let mut side = SEED_SIDE;
    let mut generations = TOTAL_ITERATIONS;
    let mut dump = None;
    let next_arg = |i: usize, flag: &str| -> &str {
        args.get(i)
            .map(String::as_str)
            .unwrap_or_else(|| panic!("{flag} requires a value"))
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--threads" => {
                i += 1;
                let n: usize = next_arg(i, "--threads")
                    .parse()
                    .expect("--threads requires a positive integer");
                config = config.thread_count(n);
            }
            "--max-threads" => {
                i += 1;
                let n: usize = next_arg(i, "--max-threads")
                    .parse()
                    .expect("--max-threads requires a positive integer");
                config = config.max_threads(n);
            }
            "--tile" => {
                i += 1;
                let n: i64 = next_arg(i, "--tile")
                    .parse()
                    .expect("--tile requires a positive integer");
                config = config.tile_size(n, n);
            }
            "--side" => {
                i += 1;
                side = next_arg(i, "--side")
                    .parse()
                    .expect("--side requires a positive integer");
            }
            "--generations" => {
                i += 1;
                generations = next_arg(i, "--generations")
                    .parse()
                    .expect("--generations requires a positive integer");
            }
            "--dump" => {
                i += 1;
                dump = Some(next_arg(i, "--dump").to_owned());
            }
            other => panic!(
                "unknown argument: {other}\nusage: sparse-life [--threads N] [--max-threads N] [--tile N] [--side N] [--generations N] [--dump PATH]"
            ),
        }
        i += 1;
    }
    MainArgs {
        config,
        side,
        generations,
        dump,
    }
}

fn random_soup(side: i64) -> Vec<(i64, i64)> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED_1234_ABCD_EF01);
    let threshold = (u64::MAX as f64 * LIVE_DENSITY) as u64;

    let mut cells = Vec::new();
    for y in 0..side {
        for x in 0..side {
            if rng.next_u64() <= threshold {
                cells.push((x, y));
            }
        }
    }
    cells
}

/// Number of `tile`-sized tiles needed to span `len` cells.
fn tiles_covering(len: i64, tile: i64) -> i64 {
    (len + tile - 1) / tile
}

fn main() {
    env_logger::init();
    let args = parse_args();

    let seed = random_soup(args.side);
    // Leave empty tiles around the soup so it has room to spread before wrapping.
    let tiles_across = tiles_covering(args.side * 2, args.config.tile_width);
    let tiles_down = tiles_covering(args.side * 2, args.config.tile_height);
    let config = args.config.world_extent(tiles_across, tiles_down);

    let start = Instant::now();
    let mut grid = match &args.dump {
        Some(path) => {
            let file = std::fs::File::create(path)
                .unwrap_or_else(|err| panic!("cannot create dump file {path}: {err}"));
            let sink = TextTileDump::new(std::io::BufWriter::new(file));
            SparseGrid::with_sink(seed, config, Box::new(sink))
        }
        None => SparseGrid::with_config(seed, config),
    };
    let setup_ms = start.elapsed().as_secs_f64() * 1000.0;
    let world = grid.bounds();
    println!(
        "Seeded {} cells in {} tiles ({setup_ms:.3} ms), world {}x{} at ({}, {}), {} threads",
        grid.population(),
        grid.tile_count(),
        world.width,
        world.height,
        world.x_min,
        world.y_min,
        grid.thread_count()
    );

    let mut total = std::time::Duration::ZERO;
    let mut done = 0;
    while done < args.generations {
        let chunk = CHECK_INTERVAL.min(args.generations - done);
        let start = Instant::now();
        grid.step_n(chunk);
        let phase = start.elapsed();
        total += phase;
        done += chunk;

        let phase_ms = phase.as_secs_f64() * 1000.0;
        let avg_ms = phase_ms / chunk as f64;
        println!(
            "Generation {}: pop = {}, tiles = {}, slab = {} superblocks",
            grid.generation(),
            grid.population(),
            grid.tile_count(),
            grid.slab().superblock_count()
        );
        println!("  {phase_ms:.3} ms total, {avg_ms:.6} ms/gen");
    }

    let total_ms = total.as_secs_f64() * 1000.0;
    let avg_ms = total_ms / args.generations.max(1) as f64;
    println!("\n--- Summary ({} generations) ---", args.generations);
    println!("SparseLife: {total_ms:.3} ms total, {avg_ms:.6} ms/gen");
    if let Some(bounds) = grid.live_bounds() {
        println!("Live bounds: {bounds:?}");
    }
}
