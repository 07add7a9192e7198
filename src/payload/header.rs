use crate::error::ConversionError;
use std::fmt;

const SEPARATOR: &str = "||";
const MULTI_MARKER: &str = "MULTI";

/// Semantic type named in a `name||type` column header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    Date,
    DateTime,
    Boolean,
    File,
    Text,
    Number,
    Other(String),
}

impl DataType {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "date" => DataType::Date,
            "date_time" => DataType::DateTime,
            "boolean" => DataType::Boolean,
            "file" => DataType::File,
            "text" => DataType::Text,
            "number" => DataType::Number,
            other => DataType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DataType::Date => "date",
            DataType::DateTime => "date_time",
            DataType::Boolean => "boolean",
            DataType::File => "file",
            DataType::Text => "text",
            DataType::Number => "number",
            DataType::Other(s) => s,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column header of the form `name||type[||MULTI]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderDescriptor {
    pub name: String,
    pub data_type: DataType,
    /// Cell holds several `\`-delimited values.
    pub multi: bool,
}

impl HeaderDescriptor {
    pub fn parse(header: &str) -> Result<Self, ConversionError> {
        let mut parts = header.split(SEPARATOR);
        let name = parts.next().unwrap_or_default();
        let data_type = parts
            .next()
            .ok_or_else(|| ConversionError::MalformedHeader(header.to_string()))?;
        let multi = parts.next() == Some(MULTI_MARKER);

        Ok(Self {
            name: name.to_string(),
            data_type: DataType::parse(data_type),
            multi,
        })
    }
}

impl fmt::Display for HeaderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, SEPARATOR, self.data_type)?;
        if self.multi {
            write!(f, "{}{}", SEPARATOR, MULTI_MARKER)?;
        }
        Ok(())
    }
}
