use candle_core::{Result, Tensor};

/// Distributional parameters of the approximate posterior, recomputed
/// on every forward pass.
///
/// The meaning depends on the posterior family:
/// * Gaussian - `loc` is the mean (n x k), `dispersion` the log variance (n x k)
/// * hyperspherical - `loc` is a unit direction (n x k), `dispersion` the
///   concentration kappa (n x 1)
/// * toroidal - `loc` holds per-circle unit 2-vectors (n x 2k),
///   `dispersion` per-circle concentrations (n x k)
pub struct PosteriorParams {
    pub loc: Tensor,
    pub dispersion: Tensor,
}

pub trait EncoderModuleT {
    /// An encoder that spits out two results (latent sample, KL loss)
    ///
    /// # Arguments
    /// * `x_nd` - input data (n x d)
    /// * `train` - reparameterize when `true`, return the posterior mode otherwise
    ///
    /// # Returns `(z_nk, kl_loss_n)`
    /// * `z_nk` - latent representation fed to the decoder
    /// * `kl_loss_n` - KL loss (n)
    fn forward_t(&self, x_nd: &Tensor, train: bool) -> Result<(Tensor, Tensor)>;

    /// Family-specific posterior parameters without sampling
    fn posterior_params(&self, x_nd: &Tensor, train: bool) -> Result<PosteriorParams>;

    fn dim_obs(&self) -> usize;

    /// Ambient dimension of the latent representation handed to the decoder
    fn dim_latent(&self) -> usize;
}

pub trait DecoderModuleT {
    /// A decoder that spits out reconstruction
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor>;

    /// A decoder that spits out reconstruction and log-likelihood
    /// * `z_nk` - latent states
    /// * `x_nd` - observed data to validate with
    /// * `llik` - fn (observed, reconstruction) -> log-likelihood
    fn forward_with_llik<LlikFn>(
        &self,
        z_nk: &Tensor,
        x_nd: &Tensor,
        llik: &LlikFn,
    ) -> Result<(Tensor, Tensor)>
    where
        LlikFn: Fn(&Tensor, &Tensor) -> Result<Tensor>;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}
