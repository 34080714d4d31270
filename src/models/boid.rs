//! A single flocking agent and its steering math.
//!
//! Boids fly at a constant speed: forces only ever change the direction of
//! travel. When a boid leaves the domain it is clamped back onto the edge and
//! the offending velocity component is mirrored, so the flock bounces instead
//! of wrapping around.
use glam::DVec2;
use rand::Rng;

use crate::models::Bounds;
use crate::spatial::CellHandle;
use crate::utils::{FlockParameters, BOID_SPEED};

/// Raw (unweighted) steering forces produced by a neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Steering {
    pub alignment: DVec2,
    pub cohesion: DVec2,
    pub separation: DVec2,
}

impl Steering {
    /// Combines the three rules using the flock's weights.
    pub fn weighted(&self, parameters: &FlockParameters) -> DVec2 {
        self.alignment * parameters.alignment
            + self.cohesion * parameters.cohesion
            + self.separation * parameters.separation
    }
}

#[derive(Debug, Clone)]
pub struct Boid {
    position: DVec2,
    previous_position: DVec2,
    velocity: DVec2,
    acceleration: DVec2,
    vision: f64,
    /// Cell currently holding this boid. Only the grid writes this.
    pub(crate) cell: Option<CellHandle>,
}

impl Boid {
    /// Creates an unregistered boid at rest acceleration.
    ///
    /// # Examples
    ///
    /// ```
    /// use flock_sim::models::Boid;
    /// use glam::DVec2;
    ///
    /// let boid = Boid::new(DVec2::new(10.0, 20.0), DVec2::X, 50.0);
    /// assert_eq!(boid.previous_position(), boid.position());
    /// assert!(boid.cell().is_none());
    /// ```
    pub fn new(position: DVec2, velocity: DVec2, vision: f64) -> Self {
        Boid {
            position,
            previous_position: position,
            velocity,
            acceleration: DVec2::ZERO,
            vision,
            cell: None,
        }
    }

    /// Spawns a boid at a uniformly random point inside `bounds` with a
    /// velocity drawn uniformly from `[-1, 1]²`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, bounds: &Bounds, vision: f64) -> Self {
        let position = DVec2::new(
            rng.random_range(0.0..=bounds.width),
            rng.random_range(0.0..=bounds.height),
        );
        let velocity = DVec2::new(rng.random_range(-1.0..=1.0), rng.random_range(-1.0..=1.0));
        Boid::new(position, velocity, vision)
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn previous_position(&self) -> DVec2 {
        self.previous_position
    }

    pub fn velocity(&self) -> DVec2 {
        self.velocity
    }

    pub fn acceleration(&self) -> DVec2 {
        self.acceleration
    }

    pub fn vision(&self) -> f64 {
        self.vision
    }

    pub fn set_vision(&mut self, vision: f64) {
        self.vision = vision;
    }

    pub fn cell(&self) -> Option<CellHandle> {
        self.cell
    }

    /// Computes alignment, cohesion and separation against `neighbors`.
    ///
    /// Every force is the zero vector when there are no neighbours. This is a
    /// pure function of the visible state.
    ///
    /// # Examples
    ///
    /// ```
    /// use flock_sim::models::Boid;
    /// use glam::DVec2;
    ///
    /// let me = Boid::new(DVec2::ZERO, DVec2::X, 10.0);
    /// let other = Boid::new(DVec2::new(2.0, 0.0), DVec2::Y, 10.0);
    /// let steering = me.compute_steering([&other]);
    /// assert_eq!(steering.alignment, DVec2::Y - DVec2::X);
    /// ```
    pub fn compute_steering<'a, I>(&self, neighbors: I) -> Steering
    where
        I: IntoIterator<Item = &'a Boid>,
    {
        let mut velocity_sum = DVec2::ZERO;
        let mut position_sum = DVec2::ZERO;
        let mut count = 0usize;

        for neighbor in neighbors {
            velocity_sum += neighbor.velocity;
            position_sum += neighbor.position;
            count += 1;
        }

        if count == 0 {
            return Steering::default();
        }

        let n = count as f64;
        let average_velocity = velocity_sum / n;
        let average_position = position_sum / n;

        Steering {
            alignment: average_velocity - self.velocity,
            cohesion: (average_position - self.position) - self.velocity,
            // mean of (self - neighbor) == self - mean(neighbor)
            separation: (self.position - average_position) - self.velocity,
        }
    }

    /// Accumulates `force` into the acceleration. No renormalization here.
    pub fn apply_force(&mut self, force: DVec2) {
        self.acceleration += force;
    }

    /// Advances the boid by one frame.
    ///
    /// The velocity picks up the accumulated acceleration and is rescaled to
    /// [`BOID_SPEED`]; a zero velocity stays zero. The position moves by the
    /// new velocity, the acceleration resets, and the result is mirrored back
    /// into `bounds`. Re-bucketing into the grid is the caller's job
    /// (`Grid::rebucket`).
    ///
    /// # Examples
    ///
    /// ```
    /// use flock_sim::models::{Boid, Bounds};
    /// use glam::DVec2;
    ///
    /// let mut boid = Boid::new(DVec2::new(50.0, 50.0), DVec2::new(3.0, 0.0), 10.0);
    /// boid.integrate(&Bounds::new(100.0, 100.0));
    /// assert_eq!(boid.position(), DVec2::new(51.0, 50.0));
    /// assert_eq!(boid.previous_position(), DVec2::new(50.0, 50.0));
    /// ```
    pub fn integrate(&mut self, bounds: &Bounds) {
        self.velocity += self.acceleration;
        self.velocity = self.velocity.normalize_or_zero() * BOID_SPEED;
        self.previous_position = self.position;
        self.position += self.velocity;
        self.acceleration = DVec2::ZERO;
        self.mirror(bounds);
    }

    fn mirror(&mut self, bounds: &Bounds) {
        if self.position.x <= 0.0 || self.position.x >= bounds.width {
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y <= 0.0 || self.position.y >= bounds.height {
            self.velocity.y = -self.velocity.y;
        }
        self.position.x = self.position.x.clamp(0.0, bounds.width);
        self.position.y = self.position.y.clamp(0.0, bounds.height);
    }
}
