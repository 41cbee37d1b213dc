//! CSV encoding of table files
//!
//! ## Format
//!
//! - Header row of column names, in frame column order
//! - One record per row; `Null` is an empty field
//! - Cells are written in their canonical text form (`Scalar::render`)
//! - On decode each column's type is inferred from all of its non-empty
//!   fields, then every field is parsed as that type. A type that would
//!   turn two distinct fields into equal values is skipped.
//!
//! `retype_columns` applies the same inference to in-memory rows, so a merge
//! sees exactly the values a later load will see.

use crate::data::{ColumnType, Frame, Scalar};

/// Encode a frame as CSV bytes. A frame without columns encodes as nothing.
pub fn encode(frame: &Frame) -> Result<Vec<u8>, csv::Error> {
    if frame.width() == 0 {
        return Ok(Vec::new());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(frame.columns())?;
    for row in frame.rows() {
        writer.write_record(row.iter().map(Scalar::render))?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Decode CSV bytes into a typed frame
pub fn decode(bytes: &[u8]) -> Result<Frame, String> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Frame::empty());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| format!("invalid header: {}", e))?
        .iter()
        .map(str::to_string)
        .collect();
    for (i, name) in columns.iter().enumerate() {
        if columns[..i].contains(name) {
            return Err(format!("duplicate column '{}' in header", name));
        }
    }

    let mut texts: Vec<Vec<String>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("record {}: {}", line + 1, e))?;
        texts.push(record.iter().map(str::to_string).collect());
    }

    let types: Vec<ColumnType> = (0..columns.len())
        .map(|col| ColumnType::infer(texts.iter().map(|r| r[col].as_str())))
        .collect();

    let rows = texts
        .iter()
        .map(|record| {
            record
                .iter()
                .zip(&types)
                .map(|(text, ty)| {
                    Scalar::parse_as(text, *ty).unwrap_or_else(|| Scalar::Str(text.clone()))
                })
                .collect()
        })
        .collect();

    Ok(Frame::from_parts(columns, rows))
}

/// Infer per-column types over the rendered text of `rows` and re-parse
/// every cell as its column's type.
///
/// Returns the inferred types.
pub fn retype_columns(rows: &mut [Vec<Scalar>], width: usize) -> Vec<ColumnType> {
    let mut types = Vec::with_capacity(width);
    for col in 0..width {
        let rendered: Vec<String> = rows.iter().map(|r| r[col].render()).collect();
        let ty = ColumnType::infer(rendered.iter().map(String::as_str));
        for (row, text) in rows.iter_mut().zip(&rendered) {
            if row[col].column_type() == Some(ty) || row[col].is_null() {
                continue;
            }
            if let Some(value) = Scalar::parse_as(text, ty) {
                row[col] = value;
            }
        }
        types.push(ty);
    }
    types
}

/// Inferred type of every column of a frame
pub fn column_types(frame: &Frame) -> Vec<ColumnType> {
    (0..frame.width())
        .map(|col| {
            let rendered: Vec<String> = frame.rows().iter().map(|r| r[col].render()).collect();
            ColumnType::infer(rendered.iter().map(String::as_str))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use chrono::NaiveDate;

    #[test]
    fn test_encode_decode_preserves_order_and_types() {
        let frame = Frame::from_rows(vec![
            Row::new()
                .with("id", 1)
                .with("name", "alice, jr.")
                .with("score", 9.5)
                .with("joined", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            Row::new().with("id", 2).with("name", "bob").with("score", 7.0),
        ]);
        let bytes = encode(&frame).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("id,name,score,joined\n"));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.columns(), frame.columns());
        assert_eq!(decoded.get(1, "score"), Some(&Scalar::Float(7.0)));
        assert_eq!(decoded.get(1, "joined"), Some(&Scalar::Null));
        assert_eq!(decoded.get(0, "name"), Some(&Scalar::from("alice, jr.")));
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_decode_empty_input_is_empty_frame() {
        let frame = decode(b"").unwrap();
        assert_eq!(frame.width(), 0);
        assert_eq!(frame.height(), 0);
        assert!(encode(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_ragged_rows() {
        let err = decode(b"a,b\n1,2\n3\n").unwrap_err();
        assert!(err.contains("record 2"), "{}", err);
    }

    #[test]
    fn test_decode_rejects_duplicate_header() {
        assert!(decode(b"a,a\n1,2\n").is_err());
    }

    #[test]
    fn test_decode_never_merges_distinct_fields() {
        let frame = decode(b"id,v\n007,a\n7,b\n7.0,c\n").unwrap();
        assert_eq!(
            frame.column("id").unwrap(),
            vec![&Scalar::from("007"), &Scalar::from("7"), &Scalar::from("7.0")]
        );
        assert_eq!(column_types(&frame), vec![ColumnType::Str, ColumnType::Str]);
    }

    #[test]
    fn test_retype_columns_unifies_mixed_inputs() {
        let mut rows = vec![
            vec![Scalar::Int(1), Scalar::from("x")],
            vec![Scalar::from("2"), Scalar::Int(3)],
            vec![Scalar::Float(3.0), Scalar::Null],
        ];
        let types = retype_columns(&mut rows, 2);
        assert_eq!(types, vec![ColumnType::Float, ColumnType::Str]);
        assert_eq!(rows[1][0], Scalar::Float(2.0));
        assert_eq!(rows[1][1], Scalar::from("3"));
        assert!(rows[2][1].is_null());
    }
}
