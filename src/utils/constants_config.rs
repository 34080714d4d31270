// src/utils/constants_config.rs
use crate::models::Bounds;
use crate::utils::{
    DEFAULT_FLOCK_PARAMETERS,
    errors::FlockError
};

/// Flock-wide tunables broadcast to every boid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockParameters {
    pub vision: f64,
    pub alignment: f64,
    pub cohesion: f64,
    pub separation: f64,
}

impl Default for FlockParameters {
    fn default() -> Self {
        DEFAULT_FLOCK_PARAMETERS
    }
}

impl FlockParameters {
    pub fn new(
        vision: Option<f64>,
        alignment: Option<f64>,
        cohesion: Option<f64>,
        separation: Option<f64>,
    ) -> Self {
        let default = DEFAULT_FLOCK_PARAMETERS;
        Self {
            vision: vision.unwrap_or(default.vision),
            alignment: alignment.unwrap_or(default.alignment),
            cohesion: cohesion.unwrap_or(default.cohesion),
            separation: separation.unwrap_or(default.separation),
        }
    }

    /// Rejects non-finite or negative values.
    ///
    /// # Example
    /// ```
    /// use flock_sim::utils::FlockParameters;
    /// let params = FlockParameters::new(Some(-1.0), None, None, None);
    /// assert!(params.validate().is_err());
    /// assert!(FlockParameters::default().validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), FlockError> {
        check_non_negative("vision", self.vision)?;
        check_non_negative("alignment", self.alignment)?;
        check_non_negative("cohesion", self.cohesion)?;
        check_non_negative("separation", self.separation)?;
        Ok(())
    }
}

/// Everything the frame loop hands the flock once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockConfig {
    pub population: usize,
    pub bounds: Bounds,
    pub parameters: FlockParameters,
}

impl FlockConfig {
    pub fn new(population: usize, bounds: Bounds) -> Self {
        Self {
            population,
            bounds,
            parameters: FlockParameters::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FlockError> {
        self.bounds.validate()?;
        self.parameters.validate()
    }
}

pub(crate) fn check_non_negative(name: &str, value: f64) -> Result<(), FlockError> {
    if !value.is_finite() || value < 0.0 {
        return Err(FlockError::invalid(name, value));
    }
    Ok(())
}
