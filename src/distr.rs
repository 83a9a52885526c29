//! Branch length distributions for random trees.

use std::fmt::{Debug, Display};

use clap::ValueEnum;
use num_traits::{Float, Zero};
use numeric_literals::replace_numeric_literals;
use rand_distr::{
    uniform::SampleUniform, Distribution, Exp, Exp1, Gamma, Open01, StandardNormal, Uniform,
};
use thiserror::Error;
use trait_set::trait_set;

trait_set! {
    /// Floating point types that can be drawn as branch lengths
    pub trait BranchLength = Debug + Display + Float + Zero + SampleUniform;
}

/// Errors raised while setting up a distribution
#[derive(Error, Debug)]
pub enum DistrError {
    /// A parameter cannot be represented in the target float type
    #[error("Parameter {0} cannot be represented as a branch length.")]
    Unrepresentable(f64),
    /// The parameters are rejected by the distribution
    #[error("Invalid parameters for the {0:?} distribution: {1}")]
    InvalidParameters(Distr, String),
}

/// Distributions available for branch lengths
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Distr {
    /// Uniform over $[0.002, 1.0)$
    Uniform,
    /// Exponential with rate $\lambda=0.15$
    Exponential,
    /// Gamma with shape $k=4$ and scale $\theta=1$
    Gamma,
}

/// Draws branch lengths from one of the [`Distr`] distributions
pub enum Sampler<T>
where
    T: BranchLength,
    StandardNormal: Distribution<T>,
    Exp1: Distribution<T>,
    Open01: Distribution<T>,
{
    Uniform(Uniform<T>),
    Exponential(Exp<T>),
    Gamma(Gamma<T>),
}

fn convert<T: BranchLength>(value: f64) -> Result<T, DistrError> {
    T::from(value).ok_or(DistrError::Unrepresentable(value))
}

impl<T> Sampler<T>
where
    T: BranchLength,
    StandardNormal: Distribution<T>,
    Exp1: Distribution<T>,
    Open01: Distribution<T>,
{
    /// Builds the sampler for a distribution
    /// ```
    /// use phylotopo::distr::{Distr, Sampler};
    /// use rand::{rngs::StdRng, SeedableRng};
    /// use rand_distr::Distribution;
    ///
    /// let sampler: Sampler<f64> = Sampler::new(Distr::Uniform).unwrap();
    /// let length = sampler.sample(&mut StdRng::seed_from_u64(7));
    /// assert!((0.002..1.0).contains(&length));
    /// ```
    #[replace_numeric_literals(convert::<T>(literal)?)]
    pub fn new(distr: Distr) -> Result<Self, DistrError> {
        let invalid = |error: String| DistrError::InvalidParameters(distr, error);
        Ok(match distr {
            Distr::Uniform => Self::Uniform(Uniform::new(0.002, 1.0)),
            Distr::Exponential => {
                Self::Exponential(Exp::new(0.15).map_err(|e| invalid(e.to_string()))?)
            }
            Distr::Gamma => {
                Self::Gamma(Gamma::new(4.0, 1.0).map_err(|e| invalid(e.to_string()))?)
            }
        })
    }
}

impl<T> Distribution<T> for Sampler<T>
where
    T: BranchLength,
    StandardNormal: Distribution<T>,
    Exp1: Distribution<T>,
    Open01: Distribution<T>,
{
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> T {
        match self {
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::Exponential(d) => d.sample(rng),
            Sampler::Gamma(d) => d.sample(rng),
        }
    }
}
