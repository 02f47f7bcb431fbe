use approx::assert_abs_diff_eq;
use matrix_util::parquet_io::read_named_matrix_parquet;
use matrix_util::traits::{ConvertMatOps, IoOps, SampleOps};
use nalgebra::DMatrix;

#[test]
fn tsv_round_trip_test() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("mat.tsv");
    let file = file.to_str().ok_or(anyhow::anyhow!("tmp path"))?;

    let xx = DMatrix::<f32>::runif(17, 3);
    xx.to_tsv(file)?;
    let yy = DMatrix::<f32>::from_tsv(file, None)?;

    assert_eq!(xx.shape(), yy.shape());
    for (a, b) in xx.iter().zip(yy.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-5);
    }
    Ok(())
}

#[test]
fn parquet_round_trip_test() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("mat.parquet");
    let file = file.to_str().ok_or(anyhow::anyhow!("tmp path"))?;

    let xx = DMatrix::<f32>::rnorm(23, 4);
    let columns: Vec<Box<str>> = (0..4)
        .map(|j| format!("dim{}", j).into_boxed_str())
        .collect();

    xx.to_parquet_with_names(file, (None, Some("obs")), Some(&columns))?;

    let parquet = read_named_matrix_parquet(file)?;
    assert_eq!(parquet.mat.shape(), (23, 4));
    assert_eq!(parquet.column_names, columns);

    for (a, b) in xx.iter().zip(parquet.mat.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-5);
    }
    Ok(())
}

#[test]
fn tensor_round_trip_test() -> anyhow::Result<()> {
    let dev = candle_core::Device::Cpu;
    let xx = DMatrix::<f32>::rnorm(11, 7);

    let x_nd = xx.to_tensor(&dev)?;
    assert_eq!(x_nd.dims(), &[11, 7]);

    let yy = DMatrix::<f32>::from_tensor(&x_nd)?;
    assert_eq!(xx, yy);
    Ok(())
}
