use matrix_util::parquet_io::write_named_columns_parquet;
use serde::Serialize;

///
/// Scalar metric traces accumulated over a run, written as a named
/// parquet matrix with one row per logging event.
///
pub struct MetricTrace {
    row_label: Box<str>,
    row_names: Option<Vec<Box<str>>>,
    names: Vec<Box<str>>,
    columns: Vec<Vec<f32>>,
}

impl MetricTrace {
    pub fn new(row_label: &str) -> Self {
        Self {
            row_label: row_label.into(),
            row_names: None,
            names: vec![],
            columns: vec![],
        }
    }

    /// label rows with e.g. epoch or step numbers
    pub fn with_row_names<T: std::fmt::Display>(mut self, rows: &[T]) -> Self {
        self.row_names = Some(
            rows.iter()
                .map(|x| x.to_string().into_boxed_str())
                .collect(),
        );
        self
    }

    pub fn push_column(mut self, name: &str, values: &[f32]) -> Self {
        self.names.push(name.into());
        self.columns.push(values.to_vec());
        self
    }

    pub fn to_parquet(&self, file_path: &str) -> anyhow::Result<()> {
        let nrows = self.columns.first().map(|c| c.len()).unwrap_or(0);
        write_named_columns_parquet(
            file_path,
            nrows,
            &self.columns,
            self.row_names.as_deref(),
            &self.row_label,
            Some(&self.names),
        )
    }
}

/// Dump the run configuration next to the outputs, pretty-printed JSON.
pub fn write_run_config<T: Serialize>(config: &T, file_path: &str) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(config)?;
    std::fs::write(file_path, text)?;
    Ok(())
}
