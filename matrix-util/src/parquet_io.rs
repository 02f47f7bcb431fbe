use nalgebra::DMatrix;
use parquet::basic::{Compression, ConvertedType, Repetition, Type as PhysicalType, ZstdLevel};
use parquet::data_type::{ByteArray, ByteArrayType, FloatType};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::RowAccessor;
use parquet::schema::types::Type;
use std::fs::File;
use std::sync::Arc;

/// A dense matrix with row and column names read back from parquet
pub struct ParquetMat {
    pub row_names: Vec<Box<str>>,
    pub column_names: Vec<Box<str>>,
    pub mat: DMatrix<f32>,
}

/// Write `columns` (each of length `nrows`) with a leading row-name
/// column.
///
/// * `row_names` - if `None`, just add `[0, n)` numbers
/// * `row_column_name` - header of the leading name column
/// * `column_names` - if `None`, just add `[0, p)` numbers
pub fn write_named_columns_parquet(
    file_path: &str,
    nrows: usize,
    columns: &[Vec<f32>],
    row_names: Option<&[Box<str>]>,
    row_column_name: &str,
    column_names: Option<&[Box<str>]>,
) -> anyhow::Result<()> {
    let ncols = columns.len();

    if columns.iter().any(|c| c.len() != nrows) {
        return Err(anyhow::anyhow!("columns with unequal lengths"));
    }

    if let Some(row_names) = row_names {
        if row_names.len() != nrows {
            return Err(anyhow::anyhow!(
                "row names length ({}) does not match number of rows ({})",
                row_names.len(),
                nrows
            ));
        }
    }

    let schema = build_columns_schema(ncols, column_names, row_column_name)?;

    let zstd_level = ZstdLevel::try_new(5)?;
    let writer_properties = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::ZSTD(zstd_level))
            .build(),
    );

    let row_names: Vec<ByteArray> = match row_names {
        Some(row_names) => row_names
            .iter()
            .map(|r| ByteArray::from(r.as_ref()))
            .collect(),
        None => (0..nrows)
            .map(|i| ByteArray::from(i.to_string().as_bytes()))
            .collect(),
    };

    let file = File::create(file_path)?;
    let mut writer = SerializedFileWriter::new(file, schema, writer_properties)?;
    let mut row_group = writer.next_row_group()?;

    {
        let mut name_writer = row_group
            .next_column()?
            .ok_or(anyhow::anyhow!("missing row name column"))?;
        name_writer
            .typed::<ByteArrayType>()
            .write_batch(&row_names, None, None)?;
        name_writer.close()?;
    }

    for x_j in columns.iter() {
        let mut column_writer = row_group
            .next_column()?
            .ok_or(anyhow::anyhow!("missing data column"))?;
        column_writer
            .typed::<FloatType>()
            .write_batch(x_j, None, None)?;
        column_writer.close()?;
    }

    row_group.close()?;
    writer.close()?;
    Ok(())
}

/// Read back a matrix written by `write_named_columns_parquet`; the
/// column `0` holds row names.
pub fn read_named_matrix_parquet(file_path: &str) -> anyhow::Result<ParquetMat> {
    let file = File::open(file_path)?;
    let reader = SerializedFileReader::new(file)?;
    let metadata = reader.metadata();
    let nrows = metadata.file_metadata().num_rows() as usize;

    let fields = metadata.file_metadata().schema().get_fields();
    if fields.len() < 2 {
        return Err(anyhow::anyhow!("no data columns in {}", file_path));
    }

    let column_names: Vec<Box<str>> = fields
        .iter()
        .skip(1)
        .map(|f| f.name().to_string().into_boxed_str())
        .collect();

    let ncols = column_names.len();
    let mut row_names: Vec<Box<str>> = Vec::with_capacity(nrows);
    let mut row_major_data: Vec<f32> = Vec::with_capacity(nrows * ncols);

    for record in reader.get_row_iter(None)? {
        let row = record?;
        row_names.push(row.get_string(0)?.clone().into_boxed_str());
        for j in 0..ncols {
            row_major_data.push(row.get_float(j + 1)?);
        }
    }

    Ok(ParquetMat {
        mat: DMatrix::from_row_iterator(row_names.len(), ncols, row_major_data),
        row_names,
        column_names,
    })
}

fn build_columns_schema(
    ncols: usize,
    column_names: Option<&[Box<str>]>,
    row_column_name: &str,
) -> anyhow::Result<Arc<Type>> {
    if let Some(column_names) = column_names {
        if column_names.len() != ncols {
            return Err(anyhow::anyhow!(
                "column names length ({}) does not match number of columns ({})",
                column_names.len(),
                ncols
            ));
        }
    }

    let mut fields = vec![Arc::new(
        Type::primitive_type_builder(row_column_name, PhysicalType::BYTE_ARRAY)
            .with_repetition(Repetition::REQUIRED)
            .with_converted_type(ConvertedType::UTF8)
            .build()?,
    )];

    let _column_names: Vec<Box<str>> = (0..ncols).map(|x| x.to_string().into_boxed_str()).collect();

    let column_names: &[Box<str>] = column_names.unwrap_or(&_column_names);

    for column_name in column_names {
        fields.push(Arc::new(
            Type::primitive_type_builder(column_name, PhysicalType::FLOAT)
                .with_repetition(Repetition::REQUIRED)
                .build()?,
        ));
    }

    let schema = Arc::new(
        Type::group_type_builder("2dMatrix")
            .with_fields(fields)
            .build()?,
    );

    Ok(schema)
}
