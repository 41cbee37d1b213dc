//! Data model: cell values, rows and frames

mod frame;
mod value;

pub use frame::{Frame, Row};
pub use value::{ColumnType, Scalar};

use std::collections::BTreeMap;

/// Named query parameters
pub type Params = BTreeMap<String, Scalar>;
