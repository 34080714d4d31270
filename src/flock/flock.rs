//! The flock: population, grid and worker pool behind one facade.
//!
//! A host frame loop typically calls [`Flock::configure`] with its current
//! settings, then [`Flock::update`] once, then reads positions back through
//! [`Flock::trails`] or [`Flock::for_each_boid`] to draw them.
//!
//! # Example
//!
//! ```
//! use flock_sim::flock::Flock;
//! use flock_sim::models::Bounds;
//! use flock_sim::utils::FlockConfig;
//!
//! let mut flock = Flock::with_seed(2, 42).expect("Failed to create flock");
//! let config = FlockConfig::new(200, Bounds::new(400.0, 300.0));
//!
//! for _ in 0..10 {
//!     flock.configure(&config).expect("Invalid configuration");
//!     flock.update().expect("Frame failed");
//! }
//!
//! assert_eq!(flock.len(), 200);
//! for (previous, current) in flock.trails() {
//!     assert!((current - previous).length() <= 1.0 + 1e-9);
//! }
//! ```
use std::ops::Range;
use std::sync::Arc;

use glam::DVec2;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{Boid, Bounds};
use crate::pool::{Borrowed, BufferPool};
use crate::scheduler::{split_ranges_mut, Phase, PhaseObserver, UpdateScheduler};
use crate::spatial::Grid;
use crate::utils::{check_non_negative, FlockConfig, FlockError, FlockParameters, DEFAULT_WORKER_COUNT};

pub struct Flock {
    boids: Vec<Boid>,
    /// Weighted steering per boid, written in the force phase and consumed
    /// in the integration phase.
    forces: Vec<DVec2>,
    parameters: FlockParameters,
    bounds: Bounds,
    grid: Grid,
    pool: BufferPool<usize>,
    scheduler: UpdateScheduler,
    rng: StdRng,
}

/// `bounds.width / sqrt(count)`; infinite for an empty flock, which `Grid::new`
/// turns into a single cell.
fn cell_size_for(count: usize, bounds: &Bounds) -> f64 {
    bounds.width / (count as f64).sqrt()
}

impl Flock {
    /// An empty flock with [`DEFAULT_WORKER_COUNT`] workers and an OS-seeded RNG.
    pub fn new() -> Result<Self, FlockError> {
        Self::with_workers(DEFAULT_WORKER_COUNT)
    }

    pub fn with_workers(worker_count: usize) -> Result<Self, FlockError> {
        Self::build(worker_count, StdRng::from_os_rng())
    }

    /// Like [`Flock::with_workers`] but spawns and culls boids reproducibly.
    pub fn with_seed(worker_count: usize, seed: u64) -> Result<Self, FlockError> {
        Self::build(worker_count, StdRng::seed_from_u64(seed))
    }

    fn build(worker_count: usize, rng: StdRng) -> Result<Self, FlockError> {
        let pool = BufferPool::new();
        let bounds = Bounds::default();
        let grid = Grid::new(bounds, cell_size_for(0, &bounds), pool.clone())?;
        let scheduler = UpdateScheduler::new(worker_count)?;

        Ok(Flock {
            boids: Vec::new(),
            forces: Vec::new(),
            parameters: FlockParameters::default(),
            bounds,
            grid,
            pool,
            scheduler,
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.boids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    pub fn boids(&self) -> &[Boid] {
        &self.boids
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Boid> {
        self.boids.iter()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn parameters(&self) -> FlockParameters {
        self.parameters
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pool(&self) -> &BufferPool<usize> {
        &self.pool
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    pub fn set_phase_observer(&mut self, observer: Option<Arc<dyn PhaseObserver>>) {
        self.scheduler.set_observer(observer);
    }

    /// Replaces the rule weights. Nothing changes if any weight is rejected.
    pub fn set_weights(&mut self, alignment: f64, cohesion: f64, separation: f64) -> Result<(), FlockError> {
        let candidate = FlockParameters {
            alignment,
            cohesion,
            separation,
            ..self.parameters
        };
        candidate.validate()?;
        self.parameters = candidate;
        Ok(())
    }

    /// Sets the vision radius and pushes it to every boid.
    pub fn apply_vision_radius(&mut self, vision: f64) -> Result<(), FlockError> {
        check_non_negative("vision", vision)?;
        self.parameters.vision = vision;
        for boid in &mut self.boids {
            boid.set_vision(vision);
        }
        debug!("vision radius set to {} for {} boids", vision, self.boids.len());
        Ok(())
    }

    /// Applies one frame's worth of settings from the host.
    ///
    /// Everything is validated before anything changes. The population is
    /// only rebuilt when the target size or the bounds differ, and vision is
    /// only propagated when it differs.
    ///
    /// The rebuild runs first. Weights and vision are written only once it
    /// has succeeded, so a failed call leaves the flock as it was.
    pub fn configure(&mut self, config: &FlockConfig) -> Result<(), FlockError> {
        config.validate()?;

        if config.population != self.boids.len() || config.bounds != self.bounds {
            self.resize(config.population, config.bounds)?;
        }

        let parameters = config.parameters;
        self.set_weights(parameters.alignment, parameters.cohesion, parameters.separation)?;
        if parameters.vision != self.parameters.vision {
            self.apply_vision_radius(parameters.vision)?;
        }
        Ok(())
    }

    /// Grows the population with randomly placed boids, or shrinks it by
    /// removing boids chosen uniformly at random, then rebuilds the grid with
    /// cells of `bounds.width / sqrt(count)`.
    ///
    /// # Errors
    ///
    /// Invalid bounds are rejected before anything is touched.
    pub fn resize(&mut self, count: usize, bounds: Bounds) -> Result<(), FlockError> {
        bounds.validate()?;
        let grid = Grid::new(bounds, cell_size_for(count, &bounds), self.pool.clone())?;

        let missing = count.saturating_sub(self.boids.len());
        self.boids.try_reserve_exact(missing).map_err(|err| {
            FlockError::ResourceExhaustion(format!("failed to grow flock to {} boids: {}", count, err))
        })?;

        self.grid.dispose(&mut self.boids);
        while self.boids.len() > count {
            let victim = self.rng.random_range(0..self.boids.len());
            self.boids.swap_remove(victim);
        }
        for _ in 0..missing {
            let boid = Boid::random(&mut self.rng, &bounds, self.parameters.vision);
            self.boids.push(boid);
        }

        self.bounds = bounds;
        self.install_grid(grid);
        info!(
            "resized flock to {} boids over {}x{} ({}x{} cells)",
            self.boids.len(),
            bounds.width,
            bounds.height,
            self.grid.columns(),
            self.grid.rows()
        );
        Ok(())
    }

    /// Replaces the population with `boids` as given and rebuilds the grid.
    pub fn populate(&mut self, boids: Vec<Boid>, bounds: Bounds) -> Result<(), FlockError> {
        bounds.validate()?;
        let grid = Grid::new(bounds, cell_size_for(boids.len(), &bounds), self.pool.clone())?;

        self.grid.dispose(&mut self.boids);
        self.boids = boids;
        for boid in &mut self.boids {
            boid.cell = None;
        }
        self.bounds = bounds;
        self.install_grid(grid);
        Ok(())
    }

    fn install_grid(&mut self, grid: Grid) {
        self.grid = grid;
        self.grid.initialize(&mut self.boids);
        self.forces.clear();
        self.forces.resize(self.boids.len(), DVec2::ZERO);
    }

    /// Removes every boid and empties the grid.
    pub fn clear(&mut self) {
        self.grid.dispose(&mut self.boids);
        self.boids.clear();
        self.forces.clear();
    }

    /// Indices of the boids within `radius` of boid `index`.
    pub fn neighbors(&self, index: usize, radius: f64) -> Result<Borrowed<usize>, FlockError> {
        self.grid.query_neighbors(&self.boids, index, radius)
    }

    /// Advances the simulation by exactly one frame.
    ///
    /// Every worker first computes steering for its own slice of the
    /// population against the frozen state of the whole flock. Only once all
    /// of them are done does any worker start moving boids and re-bucketing
    /// them. The call returns after both phases have finished everywhere.
    ///
    /// Debug builds audit grid membership before any boid moves. A broken
    /// grid fails the frame with the flock untouched, and keeps failing every
    /// frame until [`Flock::resize`] or [`Flock::populate`] rebuilds it.
    /// Release builds skip the audit and repair mismatches as they meet them.
    ///
    /// # Errors
    ///
    /// Any fault in either phase aborts the frame and is returned as is.
    pub fn update(&mut self) -> Result<(), FlockError> {
        if self.boids.is_empty() {
            return Ok(());
        }

        if cfg!(debug_assertions) {
            self.grid.audit(&mut self.boids)?;
        }

        let ranges = self.scheduler.partition(self.boids.len());
        self.compute_forces(&ranges)?;
        self.integrate(&ranges)
    }

    fn compute_forces(&mut self, ranges: &[Range<usize>]) -> Result<(), FlockError> {
        self.forces.resize(self.boids.len(), DVec2::ZERO);

        let boids = &self.boids;
        let grid = &self.grid;
        let parameters = self.parameters;
        let pieces = split_ranges_mut(&mut self.forces, ranges);

        self.scheduler.dispatch(Phase::Forces, pieces, |_, (start, forces)| {
            for (offset, force) in forces.iter_mut().enumerate() {
                let index = start + offset;
                let boid = &boids[index];
                let neighbors = grid.query_neighbors(boids, index, boid.vision())?;
                let steering = boid.compute_steering(neighbors.iter().map(|&other| &boids[other]));
                *force = steering.weighted(&parameters);
            }
            Ok(())
        })
    }

    fn integrate(&mut self, ranges: &[Range<usize>]) -> Result<(), FlockError> {
        let forces = &self.forces;
        let grid = &self.grid;
        let bounds = self.bounds;
        let pieces = split_ranges_mut(&mut self.boids, ranges);

        self.scheduler.dispatch(Phase::Integrate, pieces, |_, (start, boids)| {
            for (offset, boid) in boids.iter_mut().enumerate() {
                let index = start + offset;
                boid.apply_force(forces[index]);
                boid.integrate(&bounds);
                grid.rebucket(index, boid)?;
            }
            Ok(())
        })
    }

    /// Visits every boid in population order. Read-only.
    pub fn for_each_boid<F: FnMut(&Boid)>(&self, mut visitor: F) {
        for boid in &self.boids {
            visitor(boid);
        }
    }

    /// `(previous_position, position)` for every boid: the segment a trail
    /// renderer draws for the last frame.
    pub fn trails(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        self.boids
            .iter()
            .map(|boid| (boid.previous_position(), boid.position()))
    }

    /// Empties the flock and stops the workers.
    pub fn shutdown(mut self) {
        self.clear();
        self.scheduler.shutdown();
    }
}
