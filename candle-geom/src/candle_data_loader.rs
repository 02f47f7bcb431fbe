use candle_core::{Device, Tensor};
use nalgebra::DMatrix;
use rand::prelude::*;

pub struct MinibatchData {
    pub input: Tensor,
    pub labels: Option<Tensor>,
}

/// `DataLoader` for minibatch learning
pub trait DataLoader {
    /// preloaded shuffled minibatch `batch_idx`, moved to `target_device`
    fn minibatch_shuffled(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData>;

    /// minibatch `batch_idx` in the original row order
    fn minibatch_ordered(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData>;

    fn num_minibatch(&self) -> usize;

    fn num_samples(&self) -> usize;

    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()>;
}

///
/// A simple data loader for an in-memory 2d matrix. Each row is one
/// observation; labels, when present, are rows of generative
/// parameters aligned with the data rows.
///
pub struct InMemoryData {
    input_data: Vec<Tensor>,
    label_data: Option<Vec<Tensor>>,

    shuffled_input: Option<Vec<Tensor>>,
    shuffled_labels: Option<Vec<Tensor>>,

    batch_size: usize,
    chunks: Vec<Vec<usize>>,
}

fn rows_to_tensor_vec(data: &DMatrix<f32>) -> anyhow::Result<Vec<Tensor>> {
    let dev = Device::Cpu;
    let ncol = data.ncols();
    (0..data.nrows())
        .map(|i| {
            let row: Vec<f32> = data.row(i).iter().copied().collect();
            Ok(Tensor::from_vec(row, (1, ncol), &dev)?)
        })
        .collect()
}

impl InMemoryData {
    ///
    /// Create a data loader with the main data matrix `data`
    ///
    pub fn new(data: &DMatrix<f32>) -> anyhow::Result<Self> {
        Ok(InMemoryData {
            input_data: rows_to_tensor_vec(data)?,
            label_data: None,
            shuffled_input: None,
            shuffled_labels: None,
            batch_size: 0,
            chunks: vec![],
        })
    }

    ///
    /// Create a data loader with the main `data` and per-row `labels`
    ///
    pub fn new_with_labels(data: &DMatrix<f32>, labels: &DMatrix<f32>) -> anyhow::Result<Self> {
        if data.nrows() != labels.nrows() {
            return Err(anyhow::anyhow!(
                "data rows ({}) != label rows ({})",
                data.nrows(),
                labels.nrows()
            ));
        }

        Ok(InMemoryData {
            input_data: rows_to_tensor_vec(data)?,
            label_data: Some(rows_to_tensor_vec(labels)?),
            shuffled_input: None,
            shuffled_labels: None,
            batch_size: 0,
            chunks: vec![],
        })
    }

    fn gather(rows: &[Tensor], samples: &[usize]) -> anyhow::Result<Tensor> {
        let chunk: Vec<Tensor> = samples.iter().map(|&i| rows[i].clone()).collect();
        Ok(Tensor::cat(&chunk, 0)?)
    }

    fn ordered_chunk(&self, batch_idx: usize) -> anyhow::Result<Vec<usize>> {
        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("need to shuffle data first"));
        }
        let lb = batch_idx * self.batch_size;
        if lb >= self.num_samples() {
            return Err(anyhow::anyhow!(
                "invalid index = {} vs. total # = {}",
                batch_idx,
                self.num_minibatch()
            ));
        }
        let ub = (lb + self.batch_size).min(self.num_samples());
        Ok((lb..ub).collect())
    }
}

impl DataLoader for InMemoryData {
    fn minibatch_shuffled(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData> {
        let input = self
            .shuffled_input
            .as_ref()
            .and_then(|x| x.get(batch_idx))
            .ok_or(anyhow::anyhow!("need to shuffle data first"))?;

        let labels = match self.shuffled_labels.as_ref() {
            Some(labels) => Some(
                labels
                    .get(batch_idx)
                    .ok_or(anyhow::anyhow!("missing label minibatch"))?
                    .to_device(target_device)?,
            ),
            None => None,
        };

        Ok(MinibatchData {
            input: input.to_device(target_device)?,
            labels,
        })
    }

    fn minibatch_ordered(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData> {
        let samples = self.ordered_chunk(batch_idx)?;

        let input = Self::gather(&self.input_data, &samples)?.to_device(target_device)?;
        let labels = match self.label_data.as_ref() {
            Some(rows) => Some(Self::gather(rows, &samples)?.to_device(target_device)?),
            None => None,
        };

        Ok(MinibatchData { input, labels })
    }

    fn num_minibatch(&self) -> usize {
        self.chunks.len()
    }

    fn num_samples(&self) -> usize {
        self.input_data.len()
    }

    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()> {
        if batch_size == 0 {
            return Err(anyhow::anyhow!("batch size must be positive"));
        }

        self.batch_size = batch_size;

        let mut samples: Vec<usize> = (0..self.num_samples()).collect();
        samples.shuffle(&mut rand::rng());

        self.chunks = samples
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        // preload all the shuffled minibatches
        let mut shuffled_input = Vec::with_capacity(self.chunks.len());
        let mut shuffled_labels = self.label_data.as_ref().map(|_| vec![]);

        for chunk in self.chunks.iter() {
            shuffled_input.push(Self::gather(&self.input_data, chunk)?);

            if let (Some(rows), Some(out)) = (self.label_data.as_ref(), &mut shuffled_labels) {
                out.push(Self::gather(rows, chunk)?);
            }
        }

        self.shuffled_input = Some(shuffled_input);
        self.shuffled_labels = shuffled_labels;
        Ok(())
    }
}
