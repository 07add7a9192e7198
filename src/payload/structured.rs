use super::{coerce::coerce_cell, header::HeaderDescriptor};
use crate::{error::ConversionError, input::Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ANSWER_SOURCE: &str = "customer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub field_name: String,
    pub field_value: String,
    pub source: String,
}

/// Body of an answer submission for a single case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswersPayload {
    pub case_id: String,
    pub is_question_mode: bool,
    pub answers: Vec<Answer>,
}

/// Build the answers payload for one row.
///
/// Column 0 is the case id; every other column is parsed as a `name||type[||MULTI]`
/// header and its cell coerced. Answers follow header order. The first failing column
/// aborts the row.
pub fn build_answers(row: &Row, file_dir: &Path) -> Result<AnswersPayload, ConversionError> {
    let mut columns = row.iter();
    let (_, case_id) = columns
        .next()
        .ok_or_else(|| ConversionError::MissingColumn("case_id".into()))?;

    let answers = columns
        .map(|(header, cell)| {
            let descriptor = HeaderDescriptor::parse(header)?;
            Ok(Answer {
                field_value: coerce_cell(cell, &descriptor, file_dir)?,
                field_name: descriptor.name,
                source: ANSWER_SOURCE.to_string(),
            })
        })
        .collect::<Result<Vec<_>, ConversionError>>()?;

    Ok(AnswersPayload {
        case_id: case_id.to_string(),
        is_question_mode: false,
        answers,
    })
}
