use std::fmt;

/// One of the possible FileMaker field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// A text field.
    Text,
    /// A numeric field.
    Number,
    /// A container field.
    Container,
    /// A date field.
    Date,
    /// A time field.
    Time,
    /// A timestamp field.
    Timestamp,
}

impl From<&str> for FieldType {
    /// Unrecognized type strings fall back to [`FieldType::Text`].
    fn from(value: &str) -> Self {
        match value {
            "number" => FieldType::Number,
            "container" => FieldType::Container,
            "date" => FieldType::Date,
            "time" => FieldType::Time,
            "timestamp" => FieldType::Timestamp,
            _ => FieldType::Text,
        }
    }
}

/// A single cell value returned by the server, coerced according to the
/// declared type of its field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Container(String),
    Date(String),
    Time(String),
    Timestamp(String),
}

impl FieldValue {
    /// Builds a value from raw response text and the declared field type.
    ///
    /// Total: a number field whose text does not parse becomes `0.0`, every
    /// other type carries its text verbatim.
    pub fn new(raw: impl Into<String>, ty: FieldType) -> Self {
        let raw = raw.into();
        match ty {
            FieldType::Number => FieldValue::Number(raw.parse().unwrap_or(0.0)),
            FieldType::Container => FieldValue::Container(raw),
            FieldType::Date => FieldValue::Date(raw),
            FieldType::Time => FieldValue::Time(raw),
            FieldType::Timestamp => FieldValue::Timestamp(raw),
            FieldType::Text => FieldValue::Text(raw),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s)
            | FieldValue::Container(s)
            | FieldValue::Date(s)
            | FieldValue::Time(s)
            | FieldValue::Timestamp(s) => write!(f, "{s}"),
        }
    }
}
