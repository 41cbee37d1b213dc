//! Scalar cell values and column type inference
//!
//! Every cell of a table is a `Scalar`. The persisted form of a cell is its
//! canonical text (`Scalar::render`); on load each column's type is inferred
//! from all of its non-empty texts and every cell is re-parsed as that type.
//!
//! Inference never merges values: a type is only chosen for a column if
//! distinct texts stay distinct once parsed. `"7"` and `"007"` both parse
//! as the integer 7, so a column holding both stays `Str`.
//!
//! ## Equality
//!
//! `Eq`/`Hash` are used for dedup keys and join keys. They are structural,
//! except that an `Int` equals a `Float` holding the same integral value, and
//! `Null == Null` (null keys group together).

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATETIME_FORMAT_SPACE: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scalar {
    /// Explicit "absent" marker; persisted as an empty field
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Inferred type of a persisted column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    Date,
    DateTime,
    Str,
}

impl ColumnType {
    /// Inference order: the first type every text parses as wins
    const INFERENCE_ORDER: [ColumnType; 6] = [
        ColumnType::Int,
        ColumnType::Float,
        ColumnType::Bool,
        ColumnType::Date,
        ColumnType::DateTime,
        ColumnType::Str,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Bool => "bool",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Str => "str",
        }
    }

    /// Infer the narrowest type all non-empty texts parse as without two
    /// distinct texts becoming equal values.
    ///
    /// A column with no non-empty text is `Str`.
    pub fn infer<'a, I>(texts: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: HashSet<&str> = texts.into_iter().filter(|t| !t.is_empty()).collect();
        Self::INFERENCE_ORDER
            .into_iter()
            .find(|ty| ty.fits(&distinct))
            .unwrap_or(ColumnType::Str)
    }

    /// Every text parses as this type, and parsing is injective on them
    fn fits(self, distinct: &HashSet<&str>) -> bool {
        let mut seen = HashSet::with_capacity(distinct.len());
        distinct
            .iter()
            .all(|text| Scalar::parse_as(text, self).is_some_and(|value| seen.insert(value)))
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Float holding an exactly representable integer, as that integer
fn exact_int(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, DATETIME_FORMAT_SPACE))
        .ok()
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Column type this value would persist as, `None` for `Null`
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(ColumnType::Bool),
            Scalar::Int(_) => Some(ColumnType::Int),
            Scalar::Float(_) => Some(ColumnType::Float),
            Scalar::Str(_) => Some(ColumnType::Str),
            Scalar::Date(_) => Some(ColumnType::Date),
            Scalar::DateTime(_) => Some(ColumnType::DateTime),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Float(f) => exact_int(*f),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Canonical text form; `parse_as(render(v), type(v))` yields `v` again
    pub fn render(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => {
                let text = f.to_string();
                if f.is_finite() && !text.contains(['.', 'e', 'E']) {
                    format!("{}.0", text)
                } else {
                    text
                }
            }
            Scalar::Str(s) => s.clone(),
            Scalar::Date(d) => d.format(DATE_FORMAT).to_string(),
            Scalar::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }

    /// Parse a persisted field as the given column type.
    ///
    /// The empty string is `Null` for every type.
    pub fn parse_as(text: &str, ty: ColumnType) -> Option<Scalar> {
        if text.is_empty() {
            return Some(Scalar::Null);
        }
        match ty {
            ColumnType::Int => text.parse::<i64>().ok().map(Scalar::Int),
            ColumnType::Float => text.parse::<f64>().ok().map(Scalar::Float),
            ColumnType::Bool => match text {
                "true" | "True" | "TRUE" => Some(Scalar::Bool(true)),
                "false" | "False" | "FALSE" => Some(Scalar::Bool(false)),
                _ => None,
            },
            ColumnType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(Scalar::Date),
            ColumnType::DateTime => parse_datetime(text).map(Scalar::DateTime),
            ColumnType::Str => Some(Scalar::Str(text.to_string())),
        }
    }

    /// Interpret a string value in the type of `like`.
    ///
    /// Lets callers pass `"2024-01-01"` for a date column or `"2"` for an
    /// integer key. Non-string values and unparsable strings are returned
    /// unchanged.
    pub fn coerce_like(&self, like: &Scalar) -> Scalar {
        match (self, like.column_type()) {
            (Scalar::Str(text), Some(ty)) if ty != ColumnType::Str => {
                Scalar::parse_as(text, ty).unwrap_or_else(|| self.clone())
            }
            _ => self.clone(),
        }
    }

    /// Ordering between comparable values, `None` if either side is `Null`
    /// or the types are not comparable.
    ///
    /// Ints and floats compare numerically; a date compares with a datetime
    /// as midnight; a string compared with a temporal value is parsed first.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Null, _) | (_, Scalar::Null) => None,
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::DateTime(a), Scalar::DateTime(b)) => Some(a.cmp(b)),
            (Scalar::Date(a), Scalar::DateTime(b)) => a.and_hms_opt(0, 0, 0).map(|a| a.cmp(b)),
            (Scalar::DateTime(a), Scalar::Date(b)) => b.and_hms_opt(0, 0, 0).map(|b| a.cmp(&b)),
            (Scalar::Str(_), Scalar::Date(_) | Scalar::DateTime(_)) => {
                let coerced = self.coerce_like(other);
                if matches!(coerced, Scalar::Str(_)) {
                    None
                } else {
                    coerced.compare(other)
                }
            }
            (Scalar::Date(_) | Scalar::DateTime(_), Scalar::Str(_)) => {
                other.compare(self).map(Ordering::reverse)
            }
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Scalar::Int(i), Scalar::Float(f)) | (Scalar::Float(f), Scalar::Int(i)) => {
                exact_int(*f) == Some(*i)
            }
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            (Scalar::Date(a), Scalar::Date(b)) => a == b,
            (Scalar::DateTime(a), Scalar::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Scalar::Null => 0u8.hash(state),
            Scalar::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Scalar::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Scalar::Float(f) => match exact_int(*f) {
                // Must agree with Int(i) == Float(i as f64)
                Some(i) => {
                    2u8.hash(state);
                    i.hash(state);
                }
                None if f.is_nan() => {
                    3u8.hash(state);
                    f64::NAN.to_bits().hash(state);
                }
                None => {
                    3u8.hash(state);
                    f.to_bits().hash(state);
                }
            },
            Scalar::Str(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Scalar::Date(d) => {
                5u8.hash(state);
                d.hash(state);
            }
            Scalar::DateTime(dt) => {
                6u8.hash(state);
                dt.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            other => f.write_str(&other.render()),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<NaiveDate> for Scalar {
    fn from(v: NaiveDate) -> Self {
        Scalar::Date(v)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(v: NaiveDateTime) -> Self {
        Scalar::DateTime(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Scalar {
        Scalar::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_infer_prefers_narrowest_type() {
        assert_eq!(ColumnType::infer(["1", "2", ""]), ColumnType::Int);
        assert_eq!(ColumnType::infer(["1", "2.5"]), ColumnType::Float);
        assert_eq!(ColumnType::infer(["true", "false"]), ColumnType::Bool);
        assert_eq!(ColumnType::infer(["2024-01-01"]), ColumnType::Date);
        assert_eq!(
            ColumnType::infer(["2024-01-01T10:00:00", "2024-01-02 11:30:00"]),
            ColumnType::DateTime
        );
        assert_eq!(ColumnType::infer(["1", "abc"]), ColumnType::Str);
        assert_eq!(ColumnType::infer(["", ""]), ColumnType::Str);
    }

    #[test]
    fn test_infer_keeps_distinct_texts_distinct() {
        assert_eq!(ColumnType::infer(["007", "7", "7.0"]), ColumnType::Str);
        assert_eq!(ColumnType::infer(["7", "7.0"]), ColumnType::Str);
        assert_eq!(ColumnType::infer(["True", "true"]), ColumnType::Str);
        // Repeats of one text are not a collision
        assert_eq!(ColumnType::infer(["7", "7", "8"]), ColumnType::Int);
        assert_eq!(ColumnType::infer(["007"]), ColumnType::Int);
    }

    #[test]
    fn test_float_render_keeps_type_on_reload() {
        let v = Scalar::Float(3.0);
        assert_eq!(v.render(), "3.0");
        assert_eq!(ColumnType::infer([v.render().as_str()]), ColumnType::Float);
        assert_eq!(Scalar::parse_as("3.0", ColumnType::Float), Some(Scalar::Float(3.0)));
    }

    #[test]
    fn test_int_float_equality_is_hash_consistent() {
        let mut set = HashSet::new();
        set.insert(Scalar::Int(7));
        assert!(set.contains(&Scalar::Float(7.0)));
        assert!(!set.contains(&Scalar::Float(7.5)));
        assert_ne!(Scalar::Int(1), Scalar::Str("1".to_string()));
    }

    #[test]
    fn test_compare_date_with_datetime_and_string() {
        let d = date(2024, 3, 1);
        let dt = Scalar::DateTime(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        );
        assert_eq!(d.compare(&dt), Some(Ordering::Less));
        assert_eq!(d.compare(&Scalar::from("2024-03-01")), Some(Ordering::Equal));
        assert_eq!(Scalar::from("2024-02-01").compare(&d), Some(Ordering::Less));
        assert_eq!(d.compare(&Scalar::from("not a date")), None);
        assert_eq!(d.compare(&Scalar::Null), None);
    }

    #[test]
    fn test_coerce_like_parses_into_column_type() {
        assert_eq!(Scalar::from("2").coerce_like(&Scalar::Int(5)), Scalar::Int(2));
        assert_eq!(Scalar::from("x").coerce_like(&Scalar::Int(5)), Scalar::from("x"));
        assert_eq!(Scalar::Int(2).coerce_like(&Scalar::from("a")), Scalar::Int(2));
    }
}
