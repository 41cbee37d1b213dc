//! Conversions between rowdb values and Arrow
//!
//! Bound tables are read by Arrow's CSV reader with a schema pinned to the
//! column types the codec infers, so a query sees each column with the same
//! type a merge does. Results come back as `Frame`s.

use super::execute::BoundTable;
use crate::data::{ColumnType, Frame, Scalar};
use chrono::{DateTime, Datelike, NaiveDate};
use datafusion::arrow::csv::ReaderBuilder;
use datafusion::arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use datafusion::arrow::error::ArrowError;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::ScalarValue;
use datafusion::datasource::MemTable;
use datafusion::error::Result as DFResult;
use std::sync::Arc;

/// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAY_FROM_CE: i32 = 719_163;

pub(crate) fn data_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Date => DataType::Date32,
        ColumnType::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
        ColumnType::Str => DataType::Utf8,
    }
}

/// In-memory table holding every row of a bound table
pub(crate) fn mem_table(table: &BoundTable) -> DFResult<MemTable> {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|(name, ty)| Field::new(name, data_type(*ty), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let batches = if table.columns().is_empty() {
        Vec::new()
    } else {
        ReaderBuilder::new(Arc::clone(&schema))
            .with_header(true)
            .build(table.csv())?
            .collect::<Result<Vec<RecordBatch>, ArrowError>>()?
    };
    MemTable::try_new(schema, vec![batches])
}

/// Literal a placeholder is replaced with
pub(crate) fn scalar_value(value: &Scalar) -> ScalarValue {
    match value {
        Scalar::Null => ScalarValue::Null,
        Scalar::Bool(b) => ScalarValue::Boolean(Some(*b)),
        Scalar::Int(i) => ScalarValue::Int64(Some(*i)),
        Scalar::Float(f) => ScalarValue::Float64(Some(*f)),
        Scalar::Str(s) => ScalarValue::Utf8(Some(s.clone())),
        Scalar::Date(d) => {
            ScalarValue::Date32(Some(d.num_days_from_ce() - UNIX_EPOCH_DAY_FROM_CE))
        }
        Scalar::DateTime(dt) => {
            ScalarValue::TimestampMicrosecond(Some(dt.and_utc().timestamp_micros()), None)
        }
    }
}

/// Cell value of an engine result.
///
/// Types without a rowdb counterpart (decimals, intervals, lists) come back
/// as their display text.
pub(crate) fn scalar(value: ScalarValue) -> Scalar {
    if value.is_null() {
        return Scalar::Null;
    }
    let converted = match &value {
        ScalarValue::Boolean(Some(b)) => Some(Scalar::Bool(*b)),
        ScalarValue::Int8(Some(i)) => Some(Scalar::Int((*i).into())),
        ScalarValue::Int16(Some(i)) => Some(Scalar::Int((*i).into())),
        ScalarValue::Int32(Some(i)) => Some(Scalar::Int((*i).into())),
        ScalarValue::Int64(Some(i)) => Some(Scalar::Int(*i)),
        ScalarValue::UInt8(Some(i)) => Some(Scalar::Int((*i).into())),
        ScalarValue::UInt16(Some(i)) => Some(Scalar::Int((*i).into())),
        ScalarValue::UInt32(Some(i)) => Some(Scalar::Int((*i).into())),
        ScalarValue::UInt64(Some(i)) => i64::try_from(*i).ok().map(Scalar::Int),
        ScalarValue::Float32(Some(f)) => Some(Scalar::Float((*f).into())),
        ScalarValue::Float64(Some(f)) => Some(Scalar::Float(*f)),
        ScalarValue::Utf8(Some(s))
        | ScalarValue::LargeUtf8(Some(s))
        | ScalarValue::Utf8View(Some(s)) => Some(Scalar::Str(s.clone())),
        ScalarValue::Date32(Some(days)) => days
            .checked_add(UNIX_EPOCH_DAY_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(Scalar::Date),
        ScalarValue::Date64(Some(ms)) => {
            DateTime::from_timestamp_millis(*ms).map(|t| Scalar::Date(t.date_naive()))
        }
        ScalarValue::TimestampSecond(Some(s), _) => {
            DateTime::from_timestamp(*s, 0).map(|t| Scalar::DateTime(t.naive_utc()))
        }
        ScalarValue::TimestampMillisecond(Some(ms), _) => {
            DateTime::from_timestamp_millis(*ms).map(|t| Scalar::DateTime(t.naive_utc()))
        }
        ScalarValue::TimestampMicrosecond(Some(us), _) => {
            DateTime::from_timestamp_micros(*us).map(|t| Scalar::DateTime(t.naive_utc()))
        }
        ScalarValue::TimestampNanosecond(Some(ns), _) => {
            Some(Scalar::DateTime(DateTime::from_timestamp_nanos(*ns).naive_utc()))
        }
        _ => None,
    };
    converted.unwrap_or_else(|| Scalar::Str(value.to_string()))
}

/// Collect result batches into a frame with `schema`'s column names
pub(crate) fn frame(schema: &Schema, batches: &[RecordBatch]) -> DFResult<Frame> {
    let columns = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());
    for batch in batches {
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .map(|array| ScalarValue::try_from_array(array.as_ref(), row).map(scalar))
                .collect::<DFResult<Vec<Scalar>>>()?;
            rows.push(cells);
        }
    }
    Ok(Frame::from_parts(columns, rows))
}
