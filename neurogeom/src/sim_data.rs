use crate::geom_common::*;

use matrix_util::traits::IoOps;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results.\n\
		     Generated files:\n\
		     - {out}.data.parquet\n\
		     - {out}.labels.parquet\n"
    )]
    pub out: Box<str>,

    #[arg(long, short, help = "Verbosity")]
    pub verbose: bool,
}

pub fn simulate_dataset(args: &SimulateArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    let (data, labels) = load_dataset(&args.data)?;

    info!(
        "Simulated {}: {} x {}",
        args.data.dataset,
        data.nrows(),
        data.ncols()
    );

    matrix_util::common_io::mkdir_for(args.out.as_ref())?;

    data.to_parquet_with_names(&format!("{}.data.parquet", args.out), (None, Some("obs")), None)?;

    labels.to_parquet(&format!("{}.labels.parquet", args.out))?;

    info!("Wrote {}.data.parquet and {}.labels.parquet", args.out, args.out);
    Ok(())
}
