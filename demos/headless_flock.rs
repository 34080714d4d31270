// demos/headless_flock.rs
//
// Drives a flock the way a render loop would, without a window:
//   RUST_LOG=info cargo run --release --example headless_flock -- 20000 300

use std::time::Instant;

use flock_sim::models::Bounds;
use flock_sim::utils::FlockConfig;
use flock_sim::{Flock, FlockError};
use log::info;

fn main() -> Result<(), FlockError> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let population = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(10_000);
    let frames: usize = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(120);

    let mut flock = Flock::new()?;
    let config = FlockConfig::new(population, Bounds::new(1200.0, 1200.0));

    let started = Instant::now();
    for frame in 0..frames {
        flock.configure(&config)?;
        let tick = Instant::now();
        flock.update()?;

        // Stand-in for the trail renderer: pull last frame's segments.
        let travelled: f64 = flock
            .trails()
            .map(|(previous, current)| previous.distance(current))
            .sum();

        if frame % 30 == 0 {
            info!(
                "frame {:>4}: {:.2} ms, mean step {:.3}",
                frame,
                tick.elapsed().as_secs_f64() * 1000.0,
                travelled / flock.len().max(1) as f64
            );
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    println!(
        "{} boids, {} frames in {:.2} s ({:.1} fps), {} pooled buffers",
        flock.len(),
        frames,
        elapsed,
        frames as f64 / elapsed,
        flock.pool().allocations()
    );

    flock.shutdown();
    Ok(())
}
