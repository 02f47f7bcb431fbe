use crate::Mat;
use matrix_util::parquet_io::write_named_columns_parquet;

///
/// Generative parameters aligned row-by-row with a dataset; named f32
/// columns such as `angle`, `scalar`, `angle2`, `x`, `y`.
///
#[derive(Clone, Debug, Default)]
pub struct LabelTable {
    columns: Vec<(Box<str>, Vec<f32>)>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self { columns: vec![] }
    }

    pub fn with_column(mut self, name: &str, values: Vec<f32>) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    pub fn len(&self) -> usize {
        self.columns.first().map(|(_, v)| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> Vec<Box<str>> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f32]> {
        self.columns
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v.as_slice())
    }

    /// columns stacked into a matrix, in insertion order
    pub fn to_mat(&self) -> anyhow::Result<Mat> {
        if self.columns.is_empty() {
            return Err(anyhow::anyhow!("no label columns"));
        }

        let nrows = self.len();
        if self.columns.iter().any(|(_, v)| v.len() != nrows) {
            return Err(anyhow::anyhow!("label columns with unequal lengths"));
        }

        let mut ret = Mat::zeros(nrows, self.columns.len());
        for (j, (_, values)) in self.columns.iter().enumerate() {
            for (i, &v) in values.iter().enumerate() {
                ret[(i, j)] = v;
            }
        }
        Ok(ret)
    }

    pub fn to_parquet(&self, file_path: &str) -> anyhow::Result<()> {
        let names = self.column_names();
        let columns: Vec<Vec<f32>> = self.columns.iter().map(|(_, v)| v.clone()).collect();
        write_named_columns_parquet(file_path, self.len(), &columns, None, "obs", Some(&names))
    }
}
