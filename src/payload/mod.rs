pub mod coerce;
pub mod header;
pub mod structured;
pub mod template;

pub use coerce::{coerce, coerce_cell};
pub use header::{DataType, HeaderDescriptor};
pub use structured::{build_answers, Answer, AnswersPayload};
pub use template::{strip_comments, Rendered, Template};
