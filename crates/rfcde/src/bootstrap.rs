//! Poisson bootstrap weights.

use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::error::RfcdeError;

/// Build a Poisson sampler with rate `lambda`.
pub(crate) fn poisson(lambda: f64) -> Result<Poisson<f64>, RfcdeError> {
    if !(lambda.is_finite() && lambda > 0.0) {
        return Err(RfcdeError::InvalidLambda { lambda });
    }
    Poisson::new(lambda).map_err(|_| RfcdeError::InvalidLambda { lambda })
}

/// Draw one tree's bootstrap multiplicities.
///
/// Each entry is an independent Poisson(1) draw, which approximates the
/// multinomial bootstrap for large `n_train`. Zero marks an observation as
/// out-of-bag for the tree.
pub(crate) fn draw_weights(n_train: usize, rng: &mut impl Rng) -> Result<Vec<u32>, RfcdeError> {
    let unit = poisson(1.0)?;
    let mut weights = Vec::new();
    weights
        .try_reserve_exact(n_train)
        .map_err(|source| RfcdeError::ResourceExhausted {
            what: "bootstrap weights",
            source,
        })?;
    weights.extend((0..n_train).map(|_| unit.sample(rng) as u32));
    Ok(weights)
}
