pub mod sac;
pub mod scorer;

pub use sac::spatial_autocorrelogram;
pub use scorer::{default_mask_params, score_population, GridScorer, PopulationScores, SacScores};
