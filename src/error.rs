use thiserror::Error;

use crate::parser::Rule;

/// Errors raised while parsing input or formatting macros.
#[derive(Debug, Error)]
pub enum Error {
    /// The grammar rejected the input outright.
    #[error("parse error: {0}")]
    Parse(#[from] Box<pest::error::Error<Rule>>),

    /// A macro has no registered formatter and the formatter rejects
    /// unknown names.
    #[error("no formatter registered for macro \\{name}")]
    UnknownMacro { name: String },

    /// A weighted choice list was empty, or no weight in it was positive.
    #[error("weighted choice list is empty or carries no positive weight")]
    EmptyChoices,

    /// A weight was negative, NaN or infinite.
    #[error("invalid weight {weight} in weighted choice list")]
    InvalidWeight { weight: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
