//! Substitution of LaTeX macros in mixed plain-text/LaTeX strings.
//!
//! Input text is parsed into a node list: literal runs, macro invocations
//! with their options, arguments and scripts, and `$...$`-style math
//! segments. Each macro is then replaced through a registry of named
//! formatting rules. Text outside macros is preserved byte for byte, and
//! unknown macros either fail or pass through verbatim.
//!
//! ```
//! use texfmt::{FormatterRegistry, format_latex_text};
//!
//! let mut formatters = FormatterRegistry::with_defaults();
//! formatters.replace("times", " * ");
//! formatters.replace("alpha", "α");
//!
//! let formatted =
//!     format_latex_text(r"Calculate $a \times b$ where $\alpha = 5$.", formatters)?;
//! assert_eq!(formatted, "Calculate $a * b$ where $α = 5$.");
//! # Ok::<(), texfmt::Error>(())
//! ```

pub mod ast;
pub mod error;
pub mod formatter;
pub mod parser;
pub mod random;

pub use ast::{GroupNode, MacroNode, MathDelim, MathNode, Node, Span, TextNode};
pub use error::{Error, Result};
pub use formatter::{
    Formatter, FormatterRegistry, MacroFormatter, UnknownMacroPolicy, format_latex_text,
};
pub use parser::{LatexParser, enumerate_macros, parse_latex};
pub use random::{WeightedChoice, probabilistic_formatter};
