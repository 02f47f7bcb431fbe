pub mod candle_aux_layers;
pub mod candle_data_loader;
pub mod candle_decoder_fc;
pub mod candle_encoder_fc;
pub mod candle_grid_cell;
pub mod candle_grid_inference;
pub mod candle_grid_input;
pub mod candle_loss_functions;
pub mod candle_model_traits;
pub mod candle_posterior;
pub mod candle_special_fn;
pub mod candle_vae_inference;

pub use candle_core;
pub use candle_nn;
