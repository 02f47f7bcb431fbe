use crate::candle_aux_layers::StackLayers;
use crate::candle_model_traits::*;

use candle_core::{Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

/// Fully-connected decoder mapping latent representations back to the
/// data space; the reconstruction head is linear and the generative
/// likelihood is chosen by the caller (`forward_with_llik`).
pub struct FcDecoder {
    data_dim: usize,
    latent_dim: usize,
    fc_in: Linear,
    hidden: StackLayers<Linear>,
    x_loc: Linear,
}

impl FcDecoder {
    /// Will create a new fully-connected decoder with these variables:
    ///
    /// * `nn.dec.fc_in.weight`
    /// * `nn.dec.fc.{}.weight` where {} is the layer index
    /// * `nn.dec.x.loc.weight`
    ///
    /// # Arguments
    /// * `latent_dim` - ambient latent input dimension
    /// * `data_dim` - output (observation) dimension
    /// * `width`, `depth` - hidden geometry
    pub fn new(
        latent_dim: usize,
        data_dim: usize,
        width: usize,
        depth: usize,
        vs: VarBuilder,
    ) -> Result<Self> {
        let fc_in = candle_nn::linear(latent_dim, width, vs.pp("nn.dec.fc_in"))?;

        let mut hidden = StackLayers::<Linear>::new();
        for j in 0..depth {
            let _name = format!("nn.dec.fc.{}", j);
            hidden.push_with_act(
                candle_nn::linear(width, width, vs.pp(_name))?,
                candle_nn::Activation::Relu,
            );
        }

        let x_loc = candle_nn::linear(width, data_dim, vs.pp("nn.dec.x.loc"))?;

        Ok(Self {
            data_dim,
            latent_dim,
            fc_in,
            hidden,
            x_loc,
        })
    }
}

impl DecoderModuleT for FcDecoder {
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        let h = self.fc_in.forward(z_nk)?.relu()?;
        let h = self.hidden.forward(&h)?;
        self.x_loc.forward(&h)
    }

    fn forward_with_llik<LlikFn>(
        &self,
        z_nk: &Tensor,
        x_nd: &Tensor,
        llik: &LlikFn,
    ) -> Result<(Tensor, Tensor)>
    where
        LlikFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        let recon_nd = self.forward(z_nk)?;
        let llik_n = llik(x_nd, &recon_nd)?;
        Ok((recon_nd, llik_n))
    }

    fn dim_obs(&self) -> usize {
        self.data_dim
    }

    fn dim_latent(&self) -> usize {
        self.latent_dim
    }
}
