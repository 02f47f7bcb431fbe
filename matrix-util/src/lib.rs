pub mod common_io;
pub mod dmatrix_util;
pub mod image_ops;
pub mod ndarray_util;
pub mod parquet_io;
pub mod traits;
