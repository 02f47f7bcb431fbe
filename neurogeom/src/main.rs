mod curvature;
mod fit_grid_rnn;
mod fit_vae;
mod geom_common;
mod run_log;
mod sim_data;

use clap::{Parser, Subcommand};
use fit_grid_rnn::*;
use fit_vae::*;
use geom_common::*;
use sim_data::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "NEUROGEOM",
    long_about = "Neural manifold geometry toolkit.\n\
		  Fits manifold-aware variational autoencoders and grid-cell\n\
		  path-integration networks to synthetic datasets with known\n\
		  generative parameters, and evaluates the learned geometry."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Generate a synthetic dataset with generative labels",
        long_about = "Generate one of the synthetic datasets and write it out: \n\
		      {out}.data.parquet holds one observation per row and\n\
		      {out}.labels.parquet the generative parameters\n\
		      (angles, scales, positions) aligned row by row.\n"
    )]
    Simulate(SimulateArgs),

    #[command(
        about = "Fit a manifold-aware variational autoencoder",
        long_about = "Fit a fully-connected VAE in three stages: \n\
		      (1) Generate the requested dataset in memory\n\
		      (2) Train encoder-decoder via SGD on ELBO terms\n\
		      (3) Evaluate latent coordinates, reconstructions and,\n\
		      for the synthetic manifolds, learned vs. true curvature.\n"
    )]
    FitVae(FitVaeArgs),

    #[command(
        about = "Train a grid-cell path-integration network",
        long_about = "Train the position encoder, velocity transition and\n\
		      position decoder with place-kernel, transition and\n\
		      conformal isometry losses, measuring path-integration\n\
		      error and hexagonal grid scores periodically.\n"
    )]
    FitGridRnn(FitGridRnnArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Simulate(args) => {
            simulate_dataset(args)?;
        }
        Commands::FitVae(args) => {
            fit_vae(args)?;
        }
        Commands::FitGridRnn(args) => {
            fit_grid_rnn(args)?;
        }
    }

    info!("Done");
    Ok(())
}
