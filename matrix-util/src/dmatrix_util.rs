use crate::common_io::{read_lines, write_lines};
use crate::parquet_io::*;
use crate::traits::*;

use candle_core::{Device, Tensor};
pub use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand_distr::{Poisson, StandardNormal};
use rayon::prelude::*;

impl SampleOps for DMatrix<f32> {
    type Mat = DMatrix<f32>;
    type Scalar = f32;

    fn runif(dd: usize, nn: usize) -> Self::Mat {
        let rvec = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| rng.random::<f32>())
            .collect();

        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }

    fn rnorm(dd: usize, nn: usize) -> Self::Mat {
        let rvec = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| rng.sample(StandardNormal))
            .collect();

        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }

    fn rpois(dd: usize, nn: usize, rate: f32) -> Self::Mat {
        let pois =
            Poisson::new((rate as f64).max(1e-8)).expect("poisson rate must be positive");

        let rvec = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| rng.sample(pois) as f32)
            .collect();

        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }
}

impl MatOps for DMatrix<f32> {
    type Mat = DMatrix<f32>;
    type Scalar = f32;

    /// `X[,j] <- X[,j] / max(1, norm(X[,j]))`
    fn normalize_columns_inplace(&mut self) {
        for mut x_j in self.column_iter_mut() {
            let denom = x_j.norm().max(1.0);
            x_j /= denom;
        }
    }

    fn normalize_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.normalize_columns_inplace();
        ret
    }

    /// `X[,j] <- X[,j] / sd(X[,j])`
    fn scale_columns_inplace(&mut self) {
        let nn = self.nrows().max(2) as f32;
        for mut x_j in self.column_iter_mut() {
            let mean = x_j.mean();
            let ssq = x_j.iter().map(|x| (x - mean).powi(2)).sum::<f32>();
            let sd = (ssq / (nn - 1.0)).sqrt().max(1e-8);
            x_j /= sd;
        }
    }

    fn scale_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.scale_columns_inplace();
        ret
    }

    /// `X[,j] <- X[,j] - mean(X[,j])`
    fn centre_columns_inplace(&mut self) {
        for mut x_j in self.column_iter_mut() {
            let mean = x_j.mean();
            x_j.add_scalar_mut(-mean);
        }
    }

    fn centre_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.centre_columns_inplace();
        ret
    }
}

impl ConvertMatOps for DMatrix<f32> {
    type Mat = DMatrix<f32>;
    type Scalar = f32;

    fn from_tensor(x_nd: &Tensor) -> anyhow::Result<Self::Mat> {
        let (nrow, ncol) = x_nd.dims2()?;
        let data = x_nd.to_vec2::<f32>()?;
        Ok(DMatrix::from_row_iterator(
            nrow,
            ncol,
            data.into_iter().flatten(),
        ))
    }

    fn to_tensor(&self, dev: &Device) -> anyhow::Result<Tensor> {
        // `DMatrix` is column-major; the transpose's slice walks rows
        let data: Vec<f32> = self.transpose().as_slice().to_vec();
        Ok(Tensor::from_vec(data, (self.nrows(), self.ncols()), dev)?)
    }
}

impl IoOps for DMatrix<f32> {
    type Scalar = f32;
    type Mat = DMatrix<f32>;

    fn read_file_delim(file: &str, delim: char, skip: Option<usize>) -> anyhow::Result<Self::Mat> {
        let lines = read_lines(file)?;
        let skip = skip.unwrap_or(0);

        let data: Vec<Vec<f32>> = lines
            .iter()
            .skip(skip)
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.split(delim)
                    .map(|x| {
                        x.trim()
                            .parse::<f32>()
                            .map_err(|e| anyhow::anyhow!("failed to parse `{}`: {}", x, e))
                    })
                    .collect()
            })
            .collect::<anyhow::Result<_>>()?;

        if data.is_empty() {
            return Err(anyhow::anyhow!("no data in file {}", file));
        }

        let nrows = data.len();
        let ncols = data[0].len();

        if data.iter().any(|row| row.len() != ncols) {
            return Err(anyhow::anyhow!("ragged rows in file {}", file));
        }

        Ok(DMatrix::from_row_iterator(
            nrows,
            ncols,
            data.into_iter().flatten(),
        ))
    }

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()> {
        let lines: Vec<Box<str>> = self
            .row_iter()
            .map(|row| {
                row.iter()
                    .map(|x| format!("{}", *x))
                    .collect::<Vec<String>>()
                    .join(delim)
                    .into_boxed_str()
            })
            .collect();

        write_lines(&lines, file)?;
        Ok(())
    }

    fn to_parquet_with_names(
        &self,
        file_path: &str,
        row_names: (Option<&[Box<str>]>, Option<&str>),
        column_names: Option<&[Box<str>]>,
    ) -> anyhow::Result<()> {
        let (row_names, row_column_name) = row_names;

        let columns: Vec<Vec<f32>> = (0..self.ncols())
            .map(|j| self.column(j).iter().copied().collect())
            .collect();

        write_named_columns_parquet(
            file_path,
            self.nrows(),
            &columns,
            row_names,
            row_column_name.unwrap_or("row"),
            column_names,
        )
    }
}
