use approx::assert_abs_diff_eq;
use glam::DVec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::models::{Boid, Bounds, Steering};
use crate::utils::{FlockParameters, BOID_SPEED};

fn boid_at(x: f64, y: f64, vx: f64, vy: f64) -> Boid {
    Boid::new(DVec2::new(x, y), DVec2::new(vx, vy), 10.0)
}

#[test]
fn test_steering_empty_neighbourhood_is_zero() {
    let boid = boid_at(5.0, 5.0, 1.0, 0.0);
    let steering = boid.compute_steering(std::iter::empty::<&Boid>());
    assert_eq!(steering, Steering::default());
    assert_eq!(steering.alignment, DVec2::ZERO);
    assert_eq!(steering.cohesion, DVec2::ZERO);
    assert_eq!(steering.separation, DVec2::ZERO);
}

#[test]
fn test_alignment_is_average_velocity_minus_own() {
    let boid = boid_at(0.0, 0.0, 1.0, 0.0);
    let a = boid_at(1.0, 0.0, 0.0, 1.0);
    let b = boid_at(0.0, 1.0, -1.0, 3.0);

    let steering = boid.compute_steering([&a, &b]);
    // average velocity (-0.5, 2.0) minus (1, 0)
    assert_abs_diff_eq!(steering.alignment, DVec2::new(-1.5, 2.0), epsilon = 1e-12);
}

#[test]
fn test_cohesion_and_separation() {
    let boid = boid_at(2.0, 2.0, 0.0, 1.0);
    let a = boid_at(4.0, 2.0, 0.0, 0.0);
    let b = boid_at(4.0, 6.0, 0.0, 0.0);

    let steering = boid.compute_steering([&a, &b]);
    // centre of mass (4, 4)
    assert_abs_diff_eq!(steering.cohesion, DVec2::new(2.0, 2.0) - DVec2::Y, epsilon = 1e-12);
    // mean of (-2, 0) and (-2, -4)
    assert_abs_diff_eq!(steering.separation, DVec2::new(-2.0, -2.0) - DVec2::Y, epsilon = 1e-12);
}

#[test]
fn test_weighted_steering() {
    let steering = Steering {
        alignment: DVec2::new(1.0, 0.0),
        cohesion: DVec2::new(0.0, 1.0),
        separation: DVec2::new(1.0, 1.0),
    };
    let params = FlockParameters::new(None, Some(2.0), Some(0.5), Some(0.0));
    assert_abs_diff_eq!(steering.weighted(&params), DVec2::new(2.0, 0.5), epsilon = 1e-12);
}

#[test]
fn test_apply_force_accumulates_without_normalizing() {
    let mut boid = boid_at(0.0, 0.0, 1.0, 0.0);
    boid.apply_force(DVec2::new(3.0, 0.0));
    boid.apply_force(DVec2::new(0.0, 4.0));
    assert_eq!(boid.acceleration(), DVec2::new(3.0, 4.0));
}

#[test]
fn test_integrate_renormalizes_speed() {
    let bounds = Bounds::new(1000.0, 1000.0);
    let mut boid = boid_at(500.0, 500.0, 0.1, 0.2);
    boid.apply_force(DVec2::new(7.0, -3.0));
    boid.integrate(&bounds);

    assert_abs_diff_eq!(boid.velocity().length(), BOID_SPEED, epsilon = 1e-12);
    assert_eq!(boid.acceleration(), DVec2::ZERO);
    assert_eq!(boid.previous_position(), DVec2::new(500.0, 500.0));
    assert_abs_diff_eq!(boid.position(), DVec2::new(500.0, 500.0) + boid.velocity(), epsilon = 1e-12);
}

#[test]
fn test_integrate_zero_velocity_stays_zero() {
    let bounds = Bounds::new(100.0, 100.0);
    let mut boid = boid_at(50.0, 50.0, 0.0, 0.0);
    boid.integrate(&bounds);

    assert_eq!(boid.velocity(), DVec2::ZERO);
    assert!(!boid.velocity().x.is_nan() && !boid.velocity().y.is_nan());
    assert_eq!(boid.position(), DVec2::new(50.0, 50.0));
}

#[test]
fn test_mirror_low_x_edge() {
    let bounds = Bounds::new(100.0, 100.0);
    let mut boid = boid_at(0.5, 50.0, -1.0, 0.0);
    boid.integrate(&bounds);

    assert_eq!(boid.position(), DVec2::new(0.0, 50.0));
    assert_eq!(boid.velocity(), DVec2::new(1.0, 0.0));
}

#[test]
fn test_mirror_high_y_edge_is_independent_of_x() {
    let bounds = Bounds::new(100.0, 100.0);
    let direction = DVec2::new(0.6, 0.8);
    let mut boid = Boid::new(DVec2::new(50.0, 99.9), direction, 10.0);
    boid.integrate(&bounds);

    assert_abs_diff_eq!(boid.position(), DVec2::new(50.6, 100.0), epsilon = 1e-12);
    assert_abs_diff_eq!(boid.velocity(), DVec2::new(0.6, -0.8), epsilon = 1e-12);
}

#[test]
fn test_mirror_corner_flips_both_axes() {
    let bounds = Bounds::new(10.0, 10.0);
    let direction = DVec2::new(1.0, 1.0).normalize();
    let mut boid = Boid::new(DVec2::new(9.9, 9.9), direction, 10.0);
    boid.integrate(&bounds);

    assert_eq!(boid.position(), DVec2::new(10.0, 10.0));
    assert_abs_diff_eq!(boid.velocity(), -direction, epsilon = 1e-12);
}

#[test]
fn test_random_spawn_stays_in_bounds() {
    let mut rng = StdRng::seed_from_u64(7);
    let bounds = Bounds::new(30.0, 20.0);
    for _ in 0..500 {
        let boid = Boid::random(&mut rng, &bounds, 5.0);
        assert!(bounds.contains(boid.position()), "spawned outside: {:?}", boid.position());
        assert!(boid.velocity().x.abs() <= 1.0 && boid.velocity().y.abs() <= 1.0);
        assert_eq!(boid.vision(), 5.0);
        assert!(boid.cell().is_none());
    }
}
