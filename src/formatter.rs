use std::collections::HashMap;

use crate::ast::{GroupNode, MacroNode, MathNode, Node, TextNode};
use crate::error::{Error, Result};
use crate::parser::LatexParser;

/// Formatting rule for one macro name.
///
/// Implemented for any `Fn(&MacroNode, &Formatter) -> Result<String>`, so a
/// plain function works; implement it by hand when the rule carries state.
/// The `Formatter` handle lets a rule format its argument groups with the
/// full rule set, which is how nested macros resolve.
pub trait MacroFormatter {
    fn format(&self, node: &MacroNode<'_>, fmt: &Formatter) -> Result<String>;
}

impl<F> MacroFormatter for F
where
    F: Fn(&MacroNode<'_>, &Formatter) -> Result<String>,
{
    fn format(&self, node: &MacroNode<'_>, fmt: &Formatter) -> Result<String> {
        self(node, fmt)
    }
}

/// Rule that ignores the node and emits a fixed string.
struct Replacement(String);

impl MacroFormatter for Replacement {
    fn format(&self, _: &MacroNode<'_>, _: &Formatter) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Registry of formatting rules, keyed by macro name.
#[derive(Default)]
pub struct FormatterRegistry(HashMap<String, Box<dyn MacroFormatter>>);

impl FormatterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in `sqrt` and `frac` rules.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("sqrt", format_sqrt);
        registry.insert("frac", format_frac);
        registry
    }

    /// Register a formatting rule for a macro name. An existing rule under
    /// the same name is replaced, so user rules shadow the defaults.
    pub fn insert(&mut self, name: impl Into<String>, rule: impl MacroFormatter + 'static) {
        self.0.insert(name.into(), Box::new(rule));
    }

    /// Register a fixed replacement string for a macro name.
    pub fn replace(&mut self, name: impl Into<String>, replacement: impl Into<String>) {
        self.insert(name, Replacement(replacement.into()));
    }

    /// Get the rule registered for `name`
    pub fn get(&self, name: &str) -> Option<&dyn MacroFormatter> {
        self.0.get(name).map(|rule| rule.as_ref())
    }

    /// Check if a rule is registered for `name`
    pub fn is_defined(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

/// What the formatter does with a macro that has no registered rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownMacroPolicy {
    /// Formatting fails with [`Error::UnknownMacro`].
    #[default]
    Reject,
    /// The macro's source is emitted verbatim.
    Passthrough,
}

/// Applies registered formatting rules to parsed nodes.
pub struct Formatter {
    pub registry: FormatterRegistry,
    unknown: UnknownMacroPolicy,
}

impl Formatter {
    pub fn new(registry: FormatterRegistry) -> Self {
        Self {
            registry,
            unknown: UnknownMacroPolicy::default(),
        }
    }

    /// Emit unknown macros verbatim instead of failing. With an empty
    /// registry this makes formatting the identity function.
    pub fn passthrough_unknown(mut self) -> Self {
        self.unknown = UnknownMacroPolicy::Passthrough;
        self
    }

    /// Format all macros in the input text (main entry point).
    pub fn format(&self, text: &str) -> Result<String> {
        let nodes = LatexParser::parse_input(text)?;
        self.format_nodes(&nodes)
    }

    /// Format a list of nodes.
    ///
    /// Seams where a rule fired collapse doubled spaces: `$a \times b$`
    /// with `times` mapped to `" * "` yields `a * b`, not `a  *  b`. Text
    /// that never touches a replacement is emitted byte for byte.
    pub fn format_nodes(&self, nodes: &[Node<'_>]) -> Result<String> {
        let mut out = String::new();
        let mut after_macro = false;
        for node in nodes {
            match node {
                Node::Text(text) => {
                    let piece = self.format_text(text)?;
                    Self::push_seamed(&mut out, &piece, after_macro);
                    after_macro = false;
                }
                Node::Macro(m) => {
                    let piece = self.format_macro(m)?;
                    Self::push_seamed(&mut out, &piece, true);
                    after_macro = true;
                }
                Node::Math(math) => {
                    let piece = self.format_math(math)?;
                    Self::push_seamed(&mut out, &piece, false);
                    after_macro = false;
                }
            }
        }
        Ok(out)
    }

    /// Format a group's content, braces not included.
    pub fn format_group(&self, group: &GroupNode<'_>) -> Result<String> {
        self.format_nodes(&group.nodes)
    }

    fn format_text(&self, node: &TextNode<'_>) -> Result<String> {
        let mut out = node.content.to_string();
        self.append_scripts(&mut out, node.subscript.as_ref(), node.superscript.as_ref())?;
        Ok(out)
    }

    fn format_macro(&self, node: &MacroNode<'_>) -> Result<String> {
        let mut out = match self.registry.get(node.name) {
            Some(rule) => rule.format(node, self)?,
            None => match self.unknown {
                UnknownMacroPolicy::Reject => {
                    return Err(Error::UnknownMacro {
                        name: node.name.to_string(),
                    });
                }
                UnknownMacroPolicy::Passthrough => node.lexeme.to_string(),
            },
        };
        self.append_scripts(&mut out, node.subscript.as_ref(), node.superscript.as_ref())?;
        Ok(out)
    }

    fn format_math(&self, node: &MathNode<'_>) -> Result<String> {
        let mut out = String::from(node.delim.open());
        out.push_str(&self.format_nodes(&node.content)?);
        out.push_str(node.delim.close());
        Ok(out)
    }

    /// Re-emit `_{...}` / `^{...}` scripts, formatted, in source order.
    fn append_scripts(
        &self,
        out: &mut String,
        subscript: Option<&GroupNode<'_>>,
        superscript: Option<&GroupNode<'_>>,
    ) -> Result<()> {
        let mut scripts = Vec::new();
        if let Some(group) = subscript {
            scripts.push(('_', group));
        }
        if let Some(group) = superscript {
            scripts.push(('^', group));
        }
        scripts.sort_by_key(|(_, group)| group.span.start);

        for (sigil, group) in scripts {
            out.push(sigil);
            out.push('{');
            out.push_str(&self.format_group(group)?);
            out.push('}');
        }
        Ok(())
    }

    /// Push `piece`, trimming its leading spaces when the seam sits next to
    /// a replacement and the output already ends in a space. Only ASCII
    /// spaces collapse; a newline at the seam passes through.
    fn push_seamed(out: &mut String, piece: &str, at_replacement_seam: bool) {
        if at_replacement_seam && out.ends_with(' ') && piece.starts_with(' ') {
            out.push_str(piece.trim_start_matches(' '));
        } else {
            out.push_str(piece);
        }
    }
}

/// Parse `text` and apply `formatters` to every macro in it.
pub fn format_latex_text(text: &str, formatters: FormatterRegistry) -> Result<String> {
    Formatter::new(formatters).format(text)
}

/// Default rule for `\sqrt`: `√x` for a plain square root, `x^(1/n)` when
/// an index option other than 2 is present.
pub fn format_sqrt(node: &MacroNode<'_>, fmt: &Formatter) -> Result<String> {
    let index = node.first_option().filter(|idx| *idx != "2");

    match (index, node.arguments.first()) {
        (None, Some(arg)) => {
            let formatted = fmt.format_group(arg)?;
            if needs_parentheses(&formatted) {
                Ok(format!("√({formatted})"))
            } else {
                Ok(format!("√{formatted}"))
            }
        }
        (None, None) => Ok("√".to_string()),
        (Some(index), Some(arg)) => {
            let formatted = fmt.format_group(arg)?;
            if needs_parentheses(&formatted) {
                Ok(format!("({formatted})^(1/{index})"))
            } else {
                Ok(format!("{formatted}^(1/{index})"))
            }
        }
        (Some(index), None) => Ok(format!("x^(1/{index})")),
    }
}

/// Default rule for `\frac`: `a/b`, parenthesizing compound operands.
pub fn format_frac(node: &MacroNode<'_>, fmt: &Formatter) -> Result<String> {
    if node.arguments.len() < 2 {
        return Ok("frac".to_string());
    }

    let mut numerator = fmt.format_group(&node.arguments[0])?;
    let mut denominator = fmt.format_group(&node.arguments[1])?;
    if needs_parentheses(&numerator) {
        numerator = format!("({numerator})");
    }
    if needs_parentheses(&denominator) {
        denominator = format!("({denominator})");
    }

    Ok(format!("{numerator}/{denominator}"))
}

const OPERATORS: [char; 11] = ['+', '-', '*', '/', '^', '=', '<', '>', '≤', '≥', '±'];

/// Whether a formatted operand is compound enough to need wrapping when it
/// lands inside a larger expression. A string already wrapped in one
/// balanced pair of parentheses does not.
fn needs_parentheses(formatted: &str) -> bool {
    if formatted.is_empty() {
        return false;
    }

    if formatted.starts_with('(') && formatted.ends_with(')') {
        let mut depth = 0i32;
        let mut closed_early = false;
        for (i, ch) in formatted.char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 && i + ch.len_utf8() < formatted.len() {
                        closed_early = true;
                        break;
                    }
                }
                _ => {}
            }
        }
        if !closed_early && depth == 0 {
            return false;
        }
    }

    if OPERATORS.iter().any(|&op| formatted.contains(op)) {
        return true;
    }

    if formatted.trim().contains(' ') {
        return true;
    }

    formatted.contains(")/") || formatted.contains(")(")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn replacements(entries: &[(&str, &str)]) -> FormatterRegistry {
        let mut registry = FormatterRegistry::new();
        for (name, replacement) in entries {
            registry.replace(*name, *replacement);
        }
        registry
    }

    #[test]
    fn test_format_golden_sentence() {
        let mut formatters = FormatterRegistry::with_defaults();
        formatters.replace("times", " * ");
        formatters.replace("alpha", "α");

        let result =
            format_latex_text(r"Calculate $a \times b$ where $\alpha = 5$.", formatters).unwrap();
        assert_eq!(result, "Calculate $a * b$ where $α = 5$.");
    }

    #[test]
    fn test_format_macro_free_text_unchanged() {
        // Holds whatever the registry contains, since no rule ever fires.
        let input = "no macros here. {braces}, a_b, x^2 and a stray $ sign.";
        let mut formatters = FormatterRegistry::with_defaults();
        formatters.replace("alpha", "α");
        let result = format_latex_text(input, formatters).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_format_nested_macro_argument() {
        let mut formatters = FormatterRegistry::with_defaults();
        formatters.replace("alpha", "α");
        let result = format_latex_text(r"\frac{\alpha}{2}", formatters).unwrap();
        assert_eq!(result, "α/2");
    }

    #[test]
    fn test_format_unknown_macro_rejects() {
        let err = format_latex_text(r"\unknown{x}", FormatterRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownMacro { name } if name == "unknown"));
    }

    #[test]
    fn test_format_unknown_macro_inside_math_rejects() {
        let err = format_latex_text(r"$\unknown$", FormatterRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownMacro { name } if name == "unknown"));
    }

    #[test]
    fn test_format_passthrough_is_identity() {
        let inputs = [
            r"\foo[1]{x} done",
            r"Calculate $a \times b$ where $\alpha = 5$.",
            r"\sum_{i=1}^{n} x_{i} and \frac {a} {b}",
            "$$E = mc^{2}$$ and \\[y\\], with {braces} left over",
        ];
        for input in inputs {
            let formatter = Formatter::new(FormatterRegistry::new()).passthrough_unknown();
            assert_eq!(formatter.format(input).unwrap(), input, "identity of {input:?}");
        }
    }

    #[test]
    fn test_format_sqrt_plain() {
        let result = format_latex_text(r"\sqrt{4}", FormatterRegistry::with_defaults()).unwrap();
        assert_eq!(result, "√4");
    }

    #[test]
    fn test_format_sqrt_compound_argument() {
        let result = format_latex_text(r"\sqrt{a+b}", FormatterRegistry::with_defaults()).unwrap();
        assert_eq!(result, "√(a+b)");
    }

    #[test]
    fn test_format_sqrt_index_two_is_plain() {
        let result =
            format_latex_text(r"\sqrt[2]{16}", FormatterRegistry::with_defaults()).unwrap();
        assert_eq!(result, "√16");
    }

    #[test]
    fn test_format_sqrt_with_index() {
        let formatters = FormatterRegistry::with_defaults();
        assert_eq!(format_latex_text(r"\sqrt[3]{x}", formatters).unwrap(), "x^(1/3)");

        let formatters = FormatterRegistry::with_defaults();
        assert_eq!(
            format_latex_text(r"\sqrt[3]{a+b}", formatters).unwrap(),
            "(a+b)^(1/3)"
        );
    }

    #[test]
    fn test_format_sqrt_without_argument() {
        let formatters = FormatterRegistry::with_defaults();
        assert_eq!(format_latex_text(r"\sqrt", formatters).unwrap(), "√");

        let formatters = FormatterRegistry::with_defaults();
        assert_eq!(format_latex_text(r"\sqrt[5]", formatters).unwrap(), "x^(1/5)");
    }

    #[test]
    fn test_format_frac_plain() {
        let result =
            format_latex_text(r"\frac{1}{2}", FormatterRegistry::with_defaults()).unwrap();
        assert_eq!(result, "1/2");
    }

    #[test]
    fn test_format_frac_compound_operands() {
        let formatters = FormatterRegistry::with_defaults();
        assert_eq!(
            format_latex_text(r"\frac{a+b}{2}", formatters).unwrap(),
            "(a+b)/2"
        );

        let formatters = FormatterRegistry::with_defaults();
        assert_eq!(
            format_latex_text(r"\frac{1}{a+b}", formatters).unwrap(),
            "1/(a+b)"
        );
    }

    #[test]
    fn test_format_frac_missing_arguments() {
        let result = format_latex_text(r"\frac{x}", FormatterRegistry::with_defaults()).unwrap();
        assert_eq!(result, "frac");
    }

    #[test]
    fn test_format_frac_nested_sqrt() {
        let result =
            format_latex_text(r"\frac{\sqrt{2}}{2}", FormatterRegistry::with_defaults()).unwrap();
        assert_eq!(result, "√2/2");
    }

    #[test]
    fn test_format_user_rule_shadows_default() {
        let mut formatters = FormatterRegistry::with_defaults();
        formatters.replace("sqrt", "ROOT");
        assert!(formatters.is_defined("sqrt"));
        assert_eq!(format_latex_text(r"\sqrt{4}", formatters).unwrap(), "ROOT");
    }

    #[test]
    fn test_format_custom_function_rule() {
        fn upper(node: &MacroNode<'_>, fmt: &Formatter) -> Result<String> {
            match node.arguments.first() {
                Some(group) => Ok(fmt.format_group(group)?.to_uppercase()),
                None => Ok(String::new()),
            }
        }

        let mut formatters = FormatterRegistry::new();
        formatters.insert("upper", upper);
        assert_eq!(
            format_latex_text(r"\upper{shout} now", formatters).unwrap(),
            "SHOUT now"
        );
    }

    #[test]
    fn test_format_seam_collapses_doubled_space() {
        let result =
            format_latex_text(r"a \times b", replacements(&[("times", " * ")])).unwrap();
        assert_eq!(result, "a * b");
    }

    #[test]
    fn test_format_seam_after_empty_replacement() {
        let result = format_latex_text(r"a \gone b", replacements(&[("gone", "")])).unwrap();
        assert_eq!(result, "a b");
    }

    #[test]
    fn test_format_interior_whitespace_preserved() {
        let result = format_latex_text("a  b \\alpha", replacements(&[("alpha", "α")])).unwrap();
        assert_eq!(result, "a  b α");
    }

    #[test]
    fn test_format_newline_seam_untouched() {
        let result =
            format_latex_text("a\n\\times b", replacements(&[("times", " * ")])).unwrap();
        assert_eq!(result, "a\n * b");
    }

    #[test]
    fn test_format_scripts_reemitted() {
        let result = format_latex_text("x_{\\alpha}", replacements(&[("alpha", "α")])).unwrap();
        assert_eq!(result, "x_{α}");
    }

    #[test]
    fn test_format_scripts_on_macro_keep_source_order() {
        let result =
            format_latex_text(r"\sum_{i=1}^{n}", replacements(&[("sum", "Σ")])).unwrap();
        assert_eq!(result, "Σ_{i=1}^{n}");

        let result =
            format_latex_text(r"\sum^{n}_{i=1}", replacements(&[("sum", "Σ")])).unwrap();
        assert_eq!(result, "Σ^{n}_{i=1}");
    }

    #[test]
    fn test_format_math_delimiters_preserved() {
        let result = format_latex_text(
            "inline $\\alpha$, display $$\\alpha$$, bracket \\[\\alpha\\]",
            replacements(&[("alpha", "α")]),
        )
        .unwrap();
        assert_eq!(result, "inline $α$, display $$α$$, bracket \\[α\\]");
    }

    #[test]
    fn test_needs_parentheses() {
        assert!(!needs_parentheses(""));
        assert!(!needs_parentheses("4"));
        assert!(!needs_parentheses("√2"));
        assert!(!needs_parentheses("(a)"));
        assert!(!needs_parentheses("((a))"));
        assert!(!needs_parentheses("(a + b)"));
        assert!(needs_parentheses("(a)(b)"));
        assert!(needs_parentheses("a+b"));
        assert!(needs_parentheses("a b"));
        assert!(needs_parentheses("x^2"));
        assert!(needs_parentheses("1/2"));
    }
}
