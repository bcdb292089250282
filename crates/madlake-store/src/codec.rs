//! Parquet codec for Process and Access zone datasets
//!
//! Datasets travel between zones as parquet buffers built over arrow arrays.
//! The mapping is deliberately narrow: one arrow type per [`ColumnType`],
//! every column nullable. Anything richer found in a file is rejected rather
//! than guessed at.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use madlake_common::dataset::{Column, ColumnType, Dataset, Value};

use crate::error::{StoreError, StoreResult};

fn arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Bool => DataType::Boolean,
    }
}

fn column_type(ty: &DataType) -> StoreResult<ColumnType> {
    match ty {
        DataType::Int64 => Ok(ColumnType::Int),
        DataType::Float64 => Ok(ColumnType::Float),
        DataType::Utf8 => Ok(ColumnType::Text),
        DataType::Boolean => Ok(ColumnType::Bool),
        other => Err(StoreError::UnsupportedType(other.to_string())),
    }
}

/// Serialize a dataset to an in-memory parquet buffer.
pub fn encode_parquet(dataset: &Dataset) -> StoreResult<Vec<u8>> {
    let fields: Vec<Field> = dataset
        .columns
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.ty), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(dataset.columns.len());
    for (i, col) in dataset.columns.iter().enumerate() {
        let array: ArrayRef = match col.ty {
            ColumnType::Int => Arc::new(
                dataset
                    .rows
                    .iter()
                    .map(|r| r[i].as_i64())
                    .collect::<Int64Array>(),
            ),
            ColumnType::Float => Arc::new(
                dataset
                    .rows
                    .iter()
                    .map(|r| r[i].as_f64())
                    .collect::<Float64Array>(),
            ),
            ColumnType::Text => Arc::new(
                dataset
                    .rows
                    .iter()
                    .map(|r| r[i].as_str().map(|s| s.to_string()))
                    .collect::<StringArray>(),
            ),
            ColumnType::Bool => Arc::new(
                dataset
                    .rows
                    .iter()
                    .map(|r| r[i].as_bool())
                    .collect::<BooleanArray>(),
            ),
        };
        arrays.push(array);
    }

    let mut buf = Vec::new();
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(&mut buf, schema.clone(), Some(props))?;
    if !dataset.columns.is_empty() {
        let batch = RecordBatch::try_new(schema, arrays)?;
        writer.write(&batch)?;
    }
    writer.close()?;
    Ok(buf)
}

/// Deserialize a parquet buffer into a dataset with the given name.
pub fn decode_parquet(name: impl Into<String>, bytes: Vec<u8>) -> StoreResult<Dataset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?;
    let schema = builder.schema().clone();

    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        columns.push(Column::new(field.name().clone(), column_type(field.data_type())?));
    }

    let mut dataset = Dataset::new(name, columns);
    let reader = builder.build()?;
    for batch in reader {
        let batch = batch?;
        for row in 0..batch.num_rows() {
            let mut values = Vec::with_capacity(dataset.columns.len());
            for (ci, col) in dataset.columns.iter().enumerate() {
                values.push(read_value(batch.column(ci), col.ty, row)?);
            }
            dataset.rows.push(values);
        }
    }
    Ok(dataset)
}

fn read_value(array: &ArrayRef, ty: ColumnType, row: usize) -> StoreResult<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match ty {
        ColumnType::Int => Value::Int(downcast::<Int64Array>(array, "Int64")?.value(row)),
        ColumnType::Float => Value::Float(downcast::<Float64Array>(array, "Float64")?.value(row)),
        ColumnType::Text => {
            Value::Text(downcast::<StringArray>(array, "Utf8")?.value(row).to_string())
        },
        ColumnType::Bool => Value::Bool(downcast::<BooleanArray>(array, "Boolean")?.value(row)),
    };
    Ok(value)
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, expected: &str) -> StoreResult<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| StoreError::UnsupportedType(format!("expected {expected} array")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parquet_roundtrip_preserves_types_and_nulls() {
        let mut d = Dataset::new(
            "occupancy",
            vec![
                Column::new("aparcamiento_id", ColumnType::Int),
                Column::new("porcentaje_ocupacion", ColumnType::Float),
                Column::new("nivel_congestion", ColumnType::Text),
                Column::new("es_festivo", ColumnType::Bool),
            ],
        );
        d.push_row(vec![
            Value::Int(7),
            Value::Float(40.0),
            Value::Text("Bajo".into()),
            Value::Bool(false),
        ])
        .unwrap();
        d.push_row(vec![Value::Int(8), Value::Null, Value::Null, Value::Null])
            .unwrap();

        let bytes = encode_parquet(&d).unwrap();
        let back = decode_parquet("occupancy", bytes).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn empty_dataset_roundtrips() {
        let d = Dataset::new("empty", vec![Column::new("id", ColumnType::Int)]);
        let bytes = encode_parquet(&d).unwrap();
        let back = decode_parquet("empty", bytes).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.columns, d.columns);
    }
}
