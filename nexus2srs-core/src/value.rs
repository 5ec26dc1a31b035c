//! Values read from a source file: whole arrays, scan columns and metadata scalars.

use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Semantic type of a dataset, decided from its stored type without reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DataKind {
    /// Integer, unsigned, float or boolean storage.
    Numeric,
    /// Fixed or variable length strings.
    Text,
    /// Compound, enum, reference and anything else.
    Other,
}

/// A single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ScalarValue {
    /// Returns the string content of a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a float, if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Bool(v) => Some(f64::from(u8::from(*v))),
            Self::Text(_) => None,
        }
    }

    /// Returns the value as an integer, parsing text if needed.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Returns true for text values.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{}", u8::from(*v)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Shortest round-trip rendering that always keeps a decimal point for finite values.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let text = format!("{value}");
    if text.contains(['.', 'e']) {
        text
    } else {
        format!("{text}.0")
    }
}

/// A dataset read in full and flattened in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
}

impl ArrayData {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Returns true if the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Semantic kind of the stored elements.
    #[must_use]
    pub fn kind(&self) -> DataKind {
        match self {
            Self::Text(_) => DataKind::Text,
            _ => DataKind::Numeric,
        }
    }

    /// First element as a scalar.
    #[must_use]
    pub fn first(&self) -> Option<ScalarValue> {
        match self {
            Self::Float(v) => v.first().copied().map(ScalarValue::Float),
            Self::Int(v) => v.first().copied().map(ScalarValue::Int),
            Self::Bool(v) => v.first().copied().map(ScalarValue::Bool),
            Self::Text(v) => v.first().cloned().map(ScalarValue::Text),
        }
    }

    /// The single element of a size-1 array.
    #[must_use]
    pub fn into_scalar(self) -> Option<ScalarValue> {
        if self.len() == 1 {
            self.first()
        } else {
            None
        }
    }

    /// Converts the array into a scan column. Integers and booleans become floats.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn into_column(self) -> Column {
        match self {
            Self::Float(v) => Column::Numeric(v),
            Self::Int(v) => Column::Numeric(v.into_iter().map(|x| x as f64).collect()),
            Self::Bool(v) => Column::Numeric(v.into_iter().map(|x| f64::from(u8::from(x))).collect()),
            Self::Text(v) => Column::Text(v),
        }
    }

    /// Every element rendered as a string.
    #[must_use]
    pub fn into_strings(self) -> Vec<String> {
        match self {
            Self::Text(v) => v,
            Self::Float(v) => v.into_iter().map(format_float).collect(),
            Self::Int(v) => v.into_iter().map(|x| x.to_string()).collect(),
            Self::Bool(v) => v.into_iter().map(|x| u8::from(x).to_string()).collect(),
        }
    }
}

/// One column of scan data.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    /// Number of scan points in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Returns true if the column has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true for numeric columns.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }

    /// Numeric values, if this is a numeric column.
    #[must_use]
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Self::Numeric(v) => Some(v),
            Self::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_display_keeps_decimal_point() {
        assert_eq!(ScalarValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ScalarValue::Float(-0.25).to_string(), "-0.25");
        assert_eq!(ScalarValue::Float(f64::NAN).to_string(), "nan");
        assert_eq!(ScalarValue::Int(7).to_string(), "7");
        assert_eq!(ScalarValue::Bool(true).to_string(), "1");
    }

    #[test]
    fn test_into_scalar_requires_single_element() {
        assert_eq!(
            ArrayData::Int(vec![3]).into_scalar(),
            Some(ScalarValue::Int(3))
        );
        assert_eq!(ArrayData::Int(vec![3, 4]).into_scalar(), None);
        assert_eq!(ArrayData::Text(Vec::new()).into_scalar(), None);
    }

    #[test]
    fn test_integer_columns_become_numeric() {
        let column = ArrayData::Int(vec![1, 2, 3]).into_column();
        assert_eq!(column.as_numeric(), Some(&[1.0, 2.0, 3.0][..]));
        assert!(ArrayData::Text(vec!["a".into()]).into_column().as_numeric().is_none());
    }

    #[test]
    fn test_scalar_as_i64_parses_text() {
        assert_eq!(ScalarValue::from(" 1040323 ").as_i64(), Some(1_040_323));
        assert_eq!(ScalarValue::Float(12.0).as_i64(), Some(12));
        assert_eq!(ScalarValue::Float(12.5).as_i64(), None);
    }
}
