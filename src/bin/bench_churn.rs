//! Tile churn benchmark: gliders crossing tile boundaries create and retire
//! tiles every few generations, stressing the slab, the adjacency index and
//! the full relink pass.
//! Run with: cargo run --release --bin bench_churn

use std::time::Instant;

use rand::RngCore;
use rand::SeedableRng;
use sparse_life::{SparseGrid, SparseGridConfig};

const WARMUP_STEPS: u64 = 3;
const RUNS: usize = 3;
const GLIDER: [(i64, i64); 5] = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];

fn glider_field(count: usize, spacing: i64) -> Vec<(i64, i64)> {
    let mut cells = Vec::with_capacity(count * GLIDER.len());
    for i in 0..count {
        let bx = (i % 100) as i64 * spacing;
        let by = (i / 100) as i64 * spacing;
        cells.extend(GLIDER.iter().map(|&(x, y)| (bx + x, by + y)));
    }
    cells
}

/// Many gliders spread over a large torus so tiles are created and
/// retired continuously.
fn bench_tile_churn(label: &str, num_gliders: usize, steps: u64) {
    let mut best_total = f64::MAX;
    let mut churn = (0, 0);

    for run in 0..RUNS {
        let config = SparseGridConfig::default().tile_size(16, 16);
        let mut grid = SparseGrid::with_config(glider_field(num_gliders, 200), config);
        grid.step_n(WARMUP_STEPS);

        let mut peak_tiles = grid.tile_count();
        let start = Instant::now();
        for _ in 0..steps {
            grid.advance_generation();
            peak_tiles = peak_tiles.max(grid.tile_count());
        }
        let total_ms = start.elapsed().as_secs_f64() * 1000.0;

        if total_ms < best_total {
            best_total = total_ms;
        }
        churn = (peak_tiles, grid.slab().superblock_count());

        if run == RUNS - 1 {
            let avg_ms = best_total / steps as f64;
            println!(
                "{label:<36} best={avg_ms:.4} ms/step  ({best_total:.1} ms total, peak {} tiles, {} superblocks)",
                churn.0, churn.1
            );
        }
    }
}

/// Dense soup: mostly stepping and ghost exchange, little churn.
fn bench_step_performance(label: &str, size: i64, density: f64, seed: u64, threads: usize) {
    let mut best_avg = f64::MAX;

    for run in 0..RUNS {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let threshold = (u64::MAX as f64 * density) as u64;
        let mut cells = Vec::new();
        for y in 0..size {
            for x in 0..size {
                if rng.next_u64() <= threshold {
                    cells.push((x, y));
                }
            }
        }

        let config = SparseGridConfig::default()
            .thread_count(threads)
            .world_extent(size * 2 / 32, size * 2 / 32);
        let mut grid = SparseGrid::with_config(cells, config);
        grid.step_n(WARMUP_STEPS);

        let start = Instant::now();
        grid.step_n(30);
        let avg_ms = start.elapsed().as_secs_f64() * 1000.0 / 30.0;
        best_avg = best_avg.min(avg_ms);

        if run == RUNS - 1 {
            println!(
                "{label:<36} best={best_avg:.4} ms/step  pop={} tiles={}",
                grid.population(),
                grid.tile_count()
            );
        }
    }
}

fn main() {
    env_logger::init();
    println!("=== SparseLife Tile Churn Benchmark ===\n");

    println!("-- tile churn (glider expansion/retirement) --");
    bench_tile_churn("100 gliders, 200 steps", 100, 200);
    bench_tile_churn("500 gliders, 200 steps", 500, 200);
    bench_tile_churn("2000 gliders, 100 steps", 2000, 100);

    println!("\n-- step performance (serial vs pool) --");
    bench_step_performance("512x512 d=0.30, 1 thread", 512, 0.30, 0x1111, 1);
    let threads = num_cpus::get_physical().max(1);
    let label = format!("512x512 d=0.30, {threads} threads");
    bench_step_performance(&label, 512, 0.30, 0x1111, threads);
}
