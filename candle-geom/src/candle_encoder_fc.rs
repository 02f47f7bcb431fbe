use crate::candle_aux_layers::{unit_normalize, StackLayers};
use crate::candle_loss_functions::*;
use crate::candle_model_traits::*;
use crate::candle_posterior::*;
use crate::candle_special_fn::softplus_beta;

use candle_core::{Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

pub struct FcEncoderArgs {
    pub data_dim: usize,
    /// ambient latent dimension (Gaussian, hyperspherical) or the
    /// number of latent circles (toroidal)
    pub latent_dim: usize,
    pub width: usize,
    pub depth: usize,
    pub posterior: PosteriorKind,
    /// softplus sharpness for concentration heads
    pub sftbeta: f64,
}

/// Fully-connected encoder mapping observations to the distributional
/// parameters of the chosen posterior family.
pub struct FcEncoder {
    data_dim: usize,
    latent_dim: usize,
    posterior: PosteriorKind,
    sftbeta: f64,
    fc_in: Linear,
    hidden: StackLayers<Linear>,
    z_loc: Linear,
    z_disp: Linear,
}

impl FcEncoder {
    /// Will create a new fully-connected encoder with these variables:
    ///
    /// * `nn.enc.fc_in.weight`
    /// * `nn.enc.fc.{}.weight` where {} is the layer index
    /// * `nn.enc.z.loc.weight`
    /// * `nn.enc.z.disp.weight`
    pub fn new(args: FcEncoderArgs, vs: VarBuilder) -> Result<Self> {
        if args.posterior == PosteriorKind::Hyperspherical && !(2..=3).contains(&args.latent_dim)
        {
            candle_core::bail!(
                "hyperspherical posterior supports latent dim 2 or 3, got {}",
                args.latent_dim
            );
        }

        if args.latent_dim == 0 {
            candle_core::bail!("latent dim must be positive");
        }

        let fc_in = candle_nn::linear(args.data_dim, args.width, vs.pp("nn.enc.fc_in"))?;

        let mut hidden = StackLayers::<Linear>::new();
        for j in 0..args.depth {
            let _name = format!("nn.enc.fc.{}", j);
            hidden.push_with_act(
                candle_nn::linear(args.width, args.width, vs.pp(_name))?,
                candle_nn::Activation::Relu,
            );
        }

        let (loc_dim, disp_dim) = match args.posterior {
            PosteriorKind::Gaussian => (args.latent_dim, args.latent_dim),
            PosteriorKind::Hyperspherical => (args.latent_dim, 1),
            PosteriorKind::Toroidal => (2 * args.latent_dim, args.latent_dim),
        };

        let z_loc = candle_nn::linear(args.width, loc_dim, vs.pp("nn.enc.z.loc"))?;
        let z_disp = candle_nn::linear(args.width, disp_dim, vs.pp("nn.enc.z.disp"))?;

        Ok(Self {
            data_dim: args.data_dim,
            latent_dim: args.latent_dim,
            posterior: args.posterior,
            sftbeta: args.sftbeta,
            fc_in,
            hidden,
            z_loc,
            z_disp,
        })
    }

    pub fn posterior_kind(&self) -> PosteriorKind {
        self.posterior
    }

    fn hidden_state(&self, x_nd: &Tensor) -> Result<Tensor> {
        let h = self.fc_in.forward(x_nd)?.relu()?;
        self.hidden.forward(&h)
    }

    /// `kappa = softplus(raw; sftbeta) + 1`, bounded to keep the
    /// rejection sampler and Bessel evaluations in range
    fn concentration(&self, raw: &Tensor) -> Result<Tensor> {
        (softplus_beta(raw, self.sftbeta)? + 1.0)?.clamp(1.0, 5e3)
    }
}

impl EncoderModuleT for FcEncoder {
    fn forward_t(&self, x_nd: &Tensor, train: bool) -> Result<(Tensor, Tensor)> {
        let params = self.posterior_params(x_nd, train)?;

        match self.posterior {
            PosteriorKind::Gaussian => {
                let z_nk = gaussian_reparameterize(&params.loc, &params.dispersion, train)?;
                let kl_n = gaussian_kl_loss(&params.loc, &params.dispersion)?;
                Ok((z_nk, kl_n))
            }
            PosteriorKind::Hyperspherical => {
                let z_nk = vmf_reparameterize(&params.loc, &params.dispersion, train)?;
                let kl_n = hyperspherical_kl_loss(&params.dispersion, self.latent_dim)?;
                Ok((z_nk, kl_n))
            }
            PosteriorKind::Toroidal => {
                let z_nk = toroidal_reparameterize(&params.loc, &params.dispersion, train)?;
                let kl_n = von_mises_kl_loss(&params.dispersion)?;
                Ok((z_nk, kl_n))
            }
        }
    }

    fn posterior_params(&self, x_nd: &Tensor, _train: bool) -> Result<PosteriorParams> {
        let h_nw = self.hidden_state(x_nd)?;

        match self.posterior {
            PosteriorKind::Gaussian => {
                let bound = (self.data_dim as f64).sqrt(); // stabilize the mean
                let loc = self.z_loc.forward(&h_nw)?.clamp(-bound, bound)?;
                let lnvar = self.z_disp.forward(&h_nw)?.clamp(-8., 8.)?;
                Ok(PosteriorParams {
                    loc,
                    dispersion: lnvar,
                })
            }
            PosteriorKind::Hyperspherical => {
                let loc = unit_normalize(&self.z_loc.forward(&h_nw)?)?;
                let kappa = self.concentration(&self.z_disp.forward(&h_nw)?)?;
                Ok(PosteriorParams {
                    loc,
                    dispersion: kappa,
                })
            }
            PosteriorKind::Toroidal => {
                let raw = self.z_loc.forward(&h_nw)?;
                let mut circles = Vec::with_capacity(self.latent_dim);
                for j in 0..self.latent_dim {
                    circles.push(unit_normalize(&raw.narrow(1, 2 * j, 2)?)?);
                }
                let loc = Tensor::cat(&circles, 1)?;
                let kappa = self.concentration(&self.z_disp.forward(&h_nw)?)?;
                Ok(PosteriorParams {
                    loc,
                    dispersion: kappa,
                })
            }
        }
    }

    fn dim_obs(&self) -> usize {
        self.data_dim
    }

    fn dim_latent(&self) -> usize {
        match self.posterior {
            PosteriorKind::Toroidal => 2 * self.latent_dim,
            _ => self.latent_dim,
        }
    }
}
