//! Uniform spatial grid for radius-bounded neighbour queries.
//!
//! The domain is cut into square cells of `cell_size`. Each boid is
//! registered in the cell under `floor(position / cell_size)`, clamped onto
//! the grid, and remembers that cell through its [`CellHandle`]. A query for
//! everything within `r` of a point only scans the cells overlapping the
//! square `[p - r, p + r]`, which keeps the cost per query roughly constant
//! when the cell size is close to the vision radius.
//!
//! Cells store population indices, not boids: the grid never duplicates
//! agent state. Query results are staged in buffers borrowed from a shared
//! [`BufferPool`], so a frame's worth of queries does not allocate once the
//! pool is warm.
//!
//! # Example
//!
//! ```
//! use flock_sim::models::{Boid, Bounds};
//! use flock_sim::pool::BufferPool;
//! use flock_sim::spatial::Grid;
//! use glam::DVec2;
//!
//! let mut boids = vec![
//!     Boid::new(DVec2::new(10.0, 10.0), DVec2::X, 5.0),
//!     Boid::new(DVec2::new(12.0, 10.0), DVec2::X, 5.0),
//!     Boid::new(DVec2::new(90.0, 90.0), DVec2::X, 5.0),
//! ];
//! let grid = Grid::new(Bounds::new(100.0, 100.0), 10.0, BufferPool::new())
//!     .expect("Failed to build grid");
//! grid.initialize(&mut boids);
//!
//! let neighbors = grid.query_neighbors(&boids, 0, 5.0).expect("Query failed");
//! assert_eq!(&neighbors[..], &[1]);
//! ```
use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec2;
use log::{debug, warn};

use crate::models::{Boid, Bounds, Rect};
use crate::pool::{Borrowed, BufferPool};
use crate::spatial::{Cell, CellHandle};
use crate::utils::FlockError;

static NEXT_GRID_ID: AtomicU64 = AtomicU64::new(1);

pub struct Grid {
    id: u64,
    bounds: Bounds,
    cell_size: f64,
    rows: usize,
    columns: usize,
    cells: Vec<Cell>,
    pool: BufferPool<usize>,
}

impl Grid {
    /// Builds an empty grid with `rows = ceil(height / cell_size)` and
    /// `columns = ceil(width / cell_size)`, never fewer than one of each.
    ///
    /// A cell size that is zero, negative or not finite (an empty flock, or a
    /// zero-width domain) yields a single cell covering the whole domain.
    ///
    /// # Errors
    ///
    /// Returns [`FlockError::ResourceExhaustion`] if the cell array cannot be allocated.
    pub fn new(bounds: Bounds, cell_size: f64, pool: BufferPool<usize>) -> Result<Self, FlockError> {
        let (cell_size, rows, columns) = if cell_size.is_finite() && cell_size > 0.0 {
            let rows = ((bounds.height / cell_size).ceil() as usize).max(1);
            let columns = ((bounds.width / cell_size).ceil() as usize).max(1);
            (cell_size, rows, columns)
        } else {
            (bounds.width.max(bounds.height).max(1.0), 1, 1)
        };

        let count = rows.checked_mul(columns).ok_or_else(|| {
            FlockError::ResourceExhaustion(format!("grid of {}x{} cells is too large", columns, rows))
        })?;

        let mut cells = Vec::new();
        cells.try_reserve_exact(count).map_err(|err| {
            FlockError::ResourceExhaustion(format!("failed to allocate {} grid cells: {}", count, err))
        })?;
        for index in 0..count {
            let column = index % columns;
            let row = index / columns;
            cells.push(Cell::new(Rect::new(
                column as f64 * cell_size,
                row as f64 * cell_size,
                cell_size,
                cell_size,
            )));
        }

        let id = NEXT_GRID_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            "built grid #{}: {}x{} cells of size {:.3} over {}x{}",
            id, columns, rows, cell_size, bounds.width, bounds.height
        );

        Ok(Grid {
            id,
            bounds,
            cell_size,
            rows,
            columns,
            cells,
            pool,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn cell_area(&self, index: usize) -> Option<Rect> {
        self.cells.get(index).map(Cell::area)
    }

    pub fn pool(&self) -> &BufferPool<usize> {
        &self.pool
    }

    /// Total number of registrations across all cells.
    pub fn member_count(&self) -> usize {
        self.cells.iter().map(Cell::len).sum()
    }

    #[inline]
    fn axis(&self, value: f64, limit: usize) -> usize {
        let last = (limit - 1) as f64;
        (value / self.cell_size).floor().clamp(0.0, last) as usize
    }

    /// Column and row of the cell covering `point`, clamped onto the grid.
    #[inline]
    pub fn cell_coords(&self, point: DVec2) -> (usize, usize) {
        (self.axis(point.x, self.columns), self.axis(point.y, self.rows))
    }

    #[inline]
    pub fn cell_of(&self, point: DVec2) -> usize {
        let (column, row) = self.cell_coords(point);
        row * self.columns + column
    }

    fn handle(&self, index: usize) -> CellHandle {
        CellHandle {
            grid: self.id,
            index,
        }
    }

    pub fn initialize(&self, boids: &mut [Boid]) {
        for (index, boid) in boids.iter_mut().enumerate() {
            self.insert(index, boid);
        }
    }

    /// Registers the boid at population `index` in the cell under its
    /// position. Does nothing if the boid is already registered anywhere.
    pub fn insert(&self, index: usize, boid: &mut Boid) {
        if boid.cell.is_some() {
            return;
        }
        let cell = self.cell_of(boid.position());
        self.cells[cell].push(index);
        boid.cell = Some(self.handle(cell));
    }

    /// Unregisters the boid at population `index`. Does nothing if it is not
    /// registered in this grid.
    ///
    /// # Errors
    ///
    /// In debug builds, returns [`FlockError::InvariantViolation`] if the
    /// boid's handle names a cell that does not list it. Release builds log
    /// the mismatch and just clear the handle.
    pub fn remove(&self, index: usize, boid: &mut Boid) -> Result<(), FlockError> {
        let handle = match boid.cell {
            Some(handle) if handle.grid == self.id => handle,
            _ => return Ok(()),
        };

        let found = self
            .cells
            .get(handle.index)
            .map_or(false, |cell| cell.take(index));
        boid.cell = None;

        if !found {
            return violation(format!(
                "boid {} claims cell {} of grid #{} but is not listed there",
                index, handle.index, self.id
            ));
        }
        Ok(())
    }

    /// Moves a registered boid to the cell under its current position if it
    /// has left its recorded cell. Unregistered boids are left alone.
    pub fn rebucket(&self, index: usize, boid: &mut Boid) -> Result<(), FlockError> {
        let handle = match boid.cell {
            Some(handle) if handle.grid == self.id => handle,
            _ => return Ok(()),
        };
        if self.cell_of(boid.position()) == handle.index {
            return Ok(());
        }
        self.remove(index, boid)?;
        self.insert(index, boid);
        Ok(())
    }

    /// Indices of every other boid within `radius` of the boid at `index`.
    ///
    /// The querying boid itself is never part of the result. The returned
    /// view is exactly as long as the number of matches and goes back to the
    /// pool when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FlockError::InvariantViolation`] if `index` is out of range
    /// and [`FlockError::ResourceExhaustion`] if the pool cannot supply a buffer.
    pub fn query_neighbors(
        &self,
        boids: &[Boid],
        index: usize,
        radius: f64,
    ) -> Result<Borrowed<usize>, FlockError> {
        let boid = boids.get(index).ok_or_else(|| {
            FlockError::InvariantViolation(format!(
                "neighbor query for boid {} in a population of {}",
                index,
                boids.len()
            ))
        })?;
        self.query(boids, boid.position(), radius, Some(index))
    }

    /// Indices of every boid within `radius` of `point`.
    pub fn query_radius(
        &self,
        boids: &[Boid],
        point: DVec2,
        radius: f64,
    ) -> Result<Borrowed<usize>, FlockError> {
        self.query(boids, point, radius, None)
    }

    fn query(
        &self,
        boids: &[Boid],
        center: DVec2,
        radius: f64,
        exclude: Option<usize>,
    ) -> Result<Borrowed<usize>, FlockError> {
        let radius = radius.max(0.0);
        let reach = DVec2::splat(radius);
        let (first_column, first_row) = self.cell_coords(center - reach);
        let (last_column, last_row) = self.cell_coords(center + reach);

        let mut candidates = 0;
        for row in first_row..=last_row {
            for column in first_column..=last_column {
                candidates += self.cells[row * self.columns + column].len();
            }
        }

        let mut view = self.pool.borrow(candidates)?;
        let radius_squared = radius * radius;
        let mut filled = 0;

        for row in first_row..=last_row {
            for column in first_column..=last_column {
                self.cells[row * self.columns + column].with_members(|members| {
                    for &candidate in members {
                        if Some(candidate) == exclude || filled == view.len() {
                            continue;
                        }
                        let Some(other) = boids.get(candidate) else {
                            continue;
                        };
                        if center.distance_squared(other.position()) <= radius_squared {
                            view[filled] = candidate;
                            filled += 1;
                        }
                    }
                });
            }
        }

        view.truncate(filled);
        Ok(view)
    }

    /// Empties every cell and clears the handles of boids registered here.
    pub fn dispose(&self, boids: &mut [Boid]) {
        for cell in &self.cells {
            cell.clear();
        }
        for boid in boids.iter_mut() {
            if matches!(boid.cell, Some(handle) if handle.grid == self.id) {
                boid.cell = None;
            }
        }
    }

    /// Cross-checks cell membership against the boids' handles and positions.
    ///
    /// Looks for registrations of missing boids, boids listed twice, handles
    /// that disagree with the listing cell, handles no cell backs up, and
    /// boids sitting in a cell that does not cover their position.
    ///
    /// With `heal` unset the first problem is returned as an error. With
    /// `heal` set every boid that was registered here is forcibly reassigned
    /// to the cell under its position, and the number of problems found is
    /// returned.
    pub fn reconcile(&self, boids: &mut [Boid], heal: bool) -> Result<usize, FlockError> {
        let mut listed_in: Vec<Option<usize>> = vec![None; boids.len()];
        let mut problems: Vec<String> = Vec::new();

        for (cell_index, cell) in self.cells.iter().enumerate() {
            cell.with_members(|members| {
                for &member in members {
                    let Some(boid) = boids.get(member) else {
                        problems.push(format!("cell {} lists missing boid {}", cell_index, member));
                        continue;
                    };
                    if let Some(previous) = listed_in[member] {
                        problems.push(format!(
                            "boid {} is listed in cells {} and {}",
                            member, previous, cell_index
                        ));
                        continue;
                    }
                    listed_in[member] = Some(cell_index);
                    if boid.cell != Some(self.handle(cell_index)) {
                        problems.push(format!(
                            "boid {} is listed in cell {} but its handle is {:?}",
                            member, cell_index, boid.cell
                        ));
                    } else if self.cell_of(boid.position()) != cell_index {
                        problems.push(format!(
                            "boid {} at {:?} is listed in cell {} which does not cover it",
                            member,
                            boid.position(),
                            cell_index
                        ));
                    }
                }
            });
        }

        for (index, boid) in boids.iter().enumerate() {
            if let Some(handle) = boid.cell {
                if handle.grid == self.id && listed_in[index].is_none() {
                    problems.push(format!(
                        "boid {} claims cell {} but no cell lists it",
                        index, handle.index
                    ));
                }
            }
        }

        if problems.is_empty() {
            return Ok(0);
        }

        if !heal {
            return Err(FlockError::InvariantViolation(format!(
                "{} ({} problem(s) in grid #{})",
                problems[0],
                problems.len(),
                self.id
            )));
        }

        warn!(
            "grid #{} membership inconsistent ({} problem(s), first: {}); reassigning",
            self.id,
            problems.len(),
            problems[0]
        );
        for cell in &self.cells {
            cell.clear();
        }
        for (index, boid) in boids.iter_mut().enumerate() {
            let registered_here = listed_in[index].is_some()
                || matches!(boid.cell, Some(handle) if handle.grid == self.id);
            if registered_here {
                boid.cell = None;
                self.insert(index, boid);
            }
        }
        Ok(problems.len())
    }

    /// [`Grid::reconcile`] with the build's policy: fail in debug builds,
    /// self-heal in release builds.
    pub fn audit(&self, boids: &mut [Boid]) -> Result<usize, FlockError> {
        self.reconcile(boids, !cfg!(debug_assertions))
    }
}

fn violation(message: String) -> Result<(), FlockError> {
    if cfg!(debug_assertions) {
        Err(FlockError::InvariantViolation(message))
    } else {
        warn!("{}; continuing", message);
        Ok(())
    }
}
