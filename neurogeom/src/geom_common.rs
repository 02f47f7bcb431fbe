#![allow(dead_code)]

pub use log::info;

pub use clap::{Args, Parser, Subcommand, ValueEnum};

pub type Mat = nalgebra::DMatrix<f32>;
pub type DVec = nalgebra::DVector<f32>;

pub use candle_geom::{candle_core, candle_nn};

use candle_geom::candle_posterior::PosteriorKind;
use neural_data::grid_fields::GridFieldConfig;
use neural_data::images::ImageConfig;
use neural_data::labels::LabelTable;
use neural_data::manifolds::{Distortion, SyntheticManifoldConfig};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

impl std::fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeDevice::Cpu => write!(f, "cpu"),
            ComputeDevice::Cuda => write!(f, "cuda"),
            ComputeDevice::Metal => write!(f, "metal"),
        }
    }
}

pub fn select_device(device: ComputeDevice, device_no: usize) -> anyhow::Result<candle_core::Device> {
    Ok(match device {
        ComputeDevice::Metal => candle_core::Device::new_metal(device_no)?,
        ComputeDevice::Cuda => candle_core::Device::new_cuda(device_no)?,
        ComputeDevice::Cpu => candle_core::Device::Cpu,
    })
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
#[clap(rename_all = "kebab-case")]
pub enum DatasetKind {
    S1Synthetic,
    S2Synthetic,
    T2Synthetic,
    Images,
    Projections,
    Points,
    PlaceCells,
    GridCells,
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DatasetKind::S1Synthetic => "s1-synthetic",
            DatasetKind::S2Synthetic => "s2-synthetic",
            DatasetKind::T2Synthetic => "t2-synthetic",
            DatasetKind::Images => "images",
            DatasetKind::Projections => "projections",
            DatasetKind::Points => "points",
            DatasetKind::PlaceCells => "place-cells",
            DatasetKind::GridCells => "grid-cells",
        };
        write!(f, "{}", name)
    }
}

impl DatasetKind {
    pub fn is_synthetic_manifold(&self) -> bool {
        matches!(
            self,
            DatasetKind::S1Synthetic | DatasetKind::S2Synthetic | DatasetKind::T2Synthetic
        )
    }

    /// angle labels recorded in degrees rather than radians
    pub fn labels_in_degrees(&self) -> bool {
        matches!(
            self,
            DatasetKind::Images | DatasetKind::Projections | DatasetKind::PlaceCells
        )
    }

    pub fn default_posterior(&self) -> PosteriorKind {
        match self {
            DatasetKind::T2Synthetic | DatasetKind::GridCells => PosteriorKind::Toroidal,
            DatasetKind::Points | DatasetKind::Images | DatasetKind::Projections => {
                PosteriorKind::Gaussian
            }
            _ => PosteriorKind::Hyperspherical,
        }
    }

    /// ambient latent dimension (Gaussian/hyperspherical) or number of
    /// latent circles (toroidal)
    pub fn default_latent_dim(&self, posterior: PosteriorKind) -> usize {
        match (self, posterior) {
            (DatasetKind::S2Synthetic, PosteriorKind::Hyperspherical) => 3,
            (DatasetKind::T2Synthetic, PosteriorKind::Toroidal) => 2,
            (DatasetKind::GridCells, PosteriorKind::Toroidal) => 2,
            (DatasetKind::S2Synthetic, _) | (DatasetKind::T2Synthetic, _) => 3,
            _ => 2,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum PosteriorArg {
    Gaussian,
    Hyperspherical,
    Toroidal,
}

impl From<PosteriorArg> for PosteriorKind {
    fn from(arg: PosteriorArg) -> Self {
        match arg {
            PosteriorArg::Gaussian => PosteriorKind::Gaussian,
            PosteriorArg::Hyperspherical => PosteriorKind::Hyperspherical,
            PosteriorArg::Toroidal => PosteriorKind::Toroidal,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum LikelihoodArg {
    Gaussian,
    Poisson,
}

impl std::fmt::Display for LikelihoodArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LikelihoodArg::Gaussian => write!(f, "gaussian"),
            LikelihoodArg::Poisson => write!(f, "poisson"),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum DistortionArg {
    Flat,
    Bump,
    Wiggles,
}

impl From<DistortionArg> for Distortion {
    fn from(arg: DistortionArg) -> Self {
        match arg {
            DistortionArg::Flat => Distortion::Flat,
            DistortionArg::Bump => Distortion::Bump,
            DistortionArg::Wiggles => Distortion::Wiggles,
        }
    }
}

/// Dataset selection and generative parameters, shared by `simulate`
/// and `fit-vae`.
#[derive(Args, Debug)]
pub struct DataArgs {
    #[arg(
        long,
        value_enum,
        default_value = "s1-synthetic",
        help = "Dataset to generate",
        long_help = "Dataset to generate.\n\
		     Synthetic manifolds (s1/s2/t2) come with known curvature;\n\
		     images, projections, points and place-cells reproduce the\n\
		     classic group-action datasets; grid-cells gives hexagonal\n\
		     firing-rate maps."
    )]
    pub dataset: DatasetKind,

    #[arg(
        long,
        default_value_t = 1000,
        help = "Number of observations",
        long_help = "Number of observations.\n\
		     S2/T2 use the largest square number below this."
    )]
    pub n_times: usize,

    #[arg(
        long,
        default_value_t = 5,
        help = "Embedding dimension of synthetic manifolds",
        long_help = "Ambient dimension the synthetic manifold is embedded in."
    )]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = 1.0, help = "Radius of S1/S2")]
    pub radius: f32,

    #[arg(long, default_value_t = 2.0, help = "Major radius of T2")]
    pub major_radius: f32,

    #[arg(long, default_value_t = 1.0, help = "Minor radius of T2")]
    pub minor_radius: f32,

    #[arg(
        long,
        default_value_t = 0.4,
        help = "Radial distortion amplitude",
        long_help = "Amplitude of the radial distortion applied to S1."
    )]
    pub distortion_amp: f32,

    #[arg(long, default_value_t = 3, help = "Number of radial wiggles")]
    pub n_wiggles: usize,

    #[arg(
        long,
        value_enum,
        default_value = "bump",
        help = "Radial distortion of S1",
        long_help = "Radial distortion of the synthetic circle:\n\
		     flat (none), one Gaussian bump, or cosine wiggles."
    )]
    pub distortion: DistortionArg,

    #[arg(
        long,
        default_value_t = false,
        help = "Random orthogonal embedding",
        long_help = "Embed with a random orthogonal rotation instead of\n\
		     zero-padding with the identity."
    )]
    pub random_rotation: bool,

    #[arg(long, default_value_t = 1e-3, help = "Observation noise variance")]
    pub noise_var: f32,

    #[arg(
        long,
        default_value_t = 4,
        help = "Blur scales per angle (images/projections)"
    )]
    pub n_scalars: usize,

    #[arg(
        long,
        default_value_t = 200,
        help = "Rotation angles (images/projections/points)"
    )]
    pub n_angles: usize,

    #[arg(long, default_value_t = 64, help = "Image side length (pixels)")]
    pub img_size: usize,

    #[arg(long, default_value_t = 40, help = "Number of cells (place/grid cells)")]
    pub n_cells: usize,

    #[arg(long, default_value_t = 1.0, help = "Grid-cell lattice spacing")]
    pub grid_scale: f32,

    #[arg(long, default_value_t = 8.0, help = "Arena side length (grid cells)")]
    pub arena_len: f32,

    #[arg(long, default_value_t = 6.0, help = "Grid orientation jitter (degrees sd)")]
    pub grid_orientation_std: f32,

    #[arg(long, default_value_t = 0.05, help = "Grid firing-field width")]
    pub field_width: f32,

    #[arg(long, default_value_t = 50, help = "Arena sampling resolution (grid cells)")]
    pub resolution: usize,

    #[arg(long, default_value_t = 0, help = "Random seed")]
    pub seed: u64,
}

impl DataArgs {
    pub fn manifold_config(&self) -> SyntheticManifoldConfig {
        SyntheticManifoldConfig {
            n_times: self.n_times,
            embedding_dim: self.embedding_dim,
            radius: self.radius,
            major_radius: self.major_radius,
            minor_radius: self.minor_radius,
            distortion_amp: self.distortion_amp,
            n_wiggles: self.n_wiggles,
            distortion: self.distortion.into(),
            random_rotation: self.random_rotation,
            noise_var: self.noise_var,
            seed: self.seed,
        }
    }
}

/// Generate the requested dataset in memory.
pub fn load_dataset(args: &DataArgs) -> anyhow::Result<(Mat, LabelTable)> {
    use neural_data::{grid_fields, images, manifolds, place_cells, points};

    match args.dataset {
        DatasetKind::S1Synthetic => manifolds::s1_synthetic(&args.manifold_config()),
        DatasetKind::S2Synthetic => manifolds::s2_synthetic(&args.manifold_config()),
        DatasetKind::T2Synthetic => manifolds::t2_synthetic(&args.manifold_config()),
        DatasetKind::Images => images::load_images(&ImageConfig {
            n_scalars: args.n_scalars,
            n_angles: args.n_angles,
            img_size: args.img_size,
            noise_sd: args.noise_var.sqrt(),
            seed: args.seed,
        }),
        DatasetKind::Projections => images::load_projections(&ImageConfig {
            n_scalars: args.n_scalars,
            n_angles: args.n_angles,
            img_size: args.img_size,
            noise_sd: args.noise_var.sqrt(),
            seed: args.seed,
        }),
        DatasetKind::Points => points::load_points(args.n_scalars, args.n_angles),
        DatasetKind::PlaceCells => {
            place_cells::load_place_cells(args.n_times, args.n_cells, args.seed)
        }
        DatasetKind::GridCells => grid_fields::load_grid_cells(&GridFieldConfig {
            grid_scale: args.grid_scale,
            arena_len: args.arena_len,
            n_cells: args.n_cells,
            orientation_mean_deg: 0.0,
            orientation_std_deg: args.grid_orientation_std,
            field_width: args.field_width,
            resolution: args.resolution,
            seed: args.seed,
        }),
    }
}

/// Label matrix for training; angle columns recorded in degrees are
/// converted to radians so the alignment loss sees one convention.
pub fn training_labels(kind: DatasetKind, labels: &LabelTable) -> anyhow::Result<Mat> {
    let mut mat = labels.to_mat()?;
    if kind.labels_in_degrees() && mat.ncols() > 0 {
        let scale = std::f32::consts::PI / 180.0;
        for i in 0..mat.nrows() {
            mat[(i, 0)] *= scale;
        }
    }
    Ok(mat)
}
