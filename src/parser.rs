use std::collections::HashSet;

use pest::{
    Parser,
    iterators::{Pair, Pairs},
};
use pest_derive::Parser;

use crate::ast::{GroupNode, MacroNode, MathDelim, MathNode, Node, Span, TextNode};
use crate::error::{Error, Result};

#[derive(Parser)]
#[grammar = "latex.pest"]
pub struct LatexParser;

impl LatexParser {
    /// Parse mixed text/LaTeX input into a list of nodes.
    ///
    /// The grammar is total: malformed constructs (`$x`, `\frac{a`, a stray
    /// `}`) degrade to literal text instead of failing, so any string parses
    /// and the returned spans tile the input exactly.
    pub fn parse_input(input: &str) -> Result<Vec<Node<'_>>> {
        let mut pairs =
            LatexParser::parse(Rule::file, input).map_err(|e| Error::Parse(Box::new(e)))?;
        let file = pairs.next().expect("parser returned no file rule");

        Ok(Self::collect_nodes(file.into_inner(), input))
    }

    /// Assemble a node list from a pair stream, merging adjacent literal
    /// runs and attaching scripts to the node they follow.
    fn collect_nodes<'a>(pairs: Pairs<'a, Rule>, input: &'a str) -> Vec<Node<'a>> {
        let mut nodes = Vec::new();
        for pair in pairs {
            match pair.as_rule() {
                Rule::macro_call => {
                    let node = Node::Macro(Self::build_macro(pair, input));
                    Self::push_node(&mut nodes, node, input);
                }
                Rule::subscript | Rule::superscript => {
                    Self::attach_script(&mut nodes, pair, input);
                }
                Rule::math_inline | Rule::math_display | Rule::math_bracket => {
                    let node = Node::Math(Self::build_math(pair, input));
                    Self::push_node(&mut nodes, node, input);
                }
                Rule::brace_group => Self::flatten_braces(&mut nodes, pair, input),
                Rule::text | Rule::symbol => {
                    Self::push_literal(&mut nodes, Self::span_of(&pair), input);
                }
                _ => {}
            }
        }
        nodes
    }

    fn build_macro<'a>(pair: Pair<'a, Rule>, input: &'a str) -> MacroNode<'a> {
        let lexeme = pair.as_str();
        let span = Self::span_of(&pair);

        let mut inner = pair.into_inner();
        let name = inner
            .next()
            .expect("grammar: macro_call begins with a name")
            .as_str();

        let mut options = Vec::new();
        let mut arguments = Vec::new();
        for group in inner {
            match group.as_rule() {
                Rule::opt_group => {
                    let body = group.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                    options.push(body);
                }
                Rule::brace_group => arguments.push(Self::build_group(group, input)),
                _ => {}
            }
        }

        MacroNode {
            name,
            options,
            arguments,
            subscript: None,
            superscript: None,
            lexeme,
            span,
        }
    }

    fn build_group<'a>(pair: Pair<'a, Rule>, input: &'a str) -> GroupNode<'a> {
        let span = Self::span_of(&pair);
        let nodes = Self::collect_nodes(pair.into_inner(), input);
        GroupNode { nodes, span }
    }

    fn build_math<'a>(pair: Pair<'a, Rule>, input: &'a str) -> MathNode<'a> {
        let delim = match pair.as_rule() {
            Rule::math_inline => MathDelim::Inline,
            Rule::math_display => MathDelim::Display,
            _ => MathDelim::Bracket,
        };
        let span = Self::span_of(&pair);
        let content = Self::collect_nodes(pair.into_inner(), input);
        MathNode {
            delim,
            content,
            span,
        }
    }

    /// Attach a `_{...}` or `^{...}` group to the node it follows. A script
    /// with no text or macro node to land on, or whose slot is already
    /// taken as in `x_{1}_{2}`, stays in the stream as literal text since
    /// dropping it would break span tiling.
    fn attach_script<'a>(nodes: &mut Vec<Node<'a>>, pair: Pair<'a, Rule>, input: &'a str) {
        let is_subscript = pair.as_rule() == Rule::subscript;
        let span = Self::span_of(&pair);
        let body = pair
            .into_inner()
            .next()
            .expect("grammar: script wraps a brace group");
        let group = Self::build_group(body, input);

        if let Some(
            Node::Text(TextNode {
                subscript,
                superscript,
                span: node_span,
                ..
            })
            | Node::Macro(MacroNode {
                subscript,
                superscript,
                span: node_span,
                ..
            }),
        ) = nodes.last_mut()
        {
            let slot = if is_subscript { subscript } else { superscript };
            if slot.is_none() {
                *slot = Some(group);
                *node_span = node_span.join(span);
                return;
            }
        }

        Self::push_literal(nodes, span, input);
    }

    /// A balanced brace run outside macro position: the braces themselves
    /// are literal text, but the content between them still parses.
    fn flatten_braces<'a>(nodes: &mut Vec<Node<'a>>, pair: Pair<'a, Rule>, input: &'a str) {
        let span = Self::span_of(&pair);
        Self::push_literal(nodes, Span::new(span.start, span.start + 1), input);
        for node in Self::collect_nodes(pair.into_inner(), input) {
            Self::push_node(nodes, node, input);
        }
        Self::push_literal(nodes, Span::new(span.end - 1, span.end), input);
    }

    /// Push a node, folding a text node into the preceding one when the two
    /// are contiguous and the earlier run carries no scripts yet.
    fn push_node<'a>(nodes: &mut Vec<Node<'a>>, node: Node<'a>, input: &'a str) {
        if let Node::Text(incoming) = node {
            if let Some(Node::Text(prev)) = nodes.last_mut() {
                if prev.subscript.is_none()
                    && prev.superscript.is_none()
                    && prev.span.end == incoming.span.start
                {
                    let content_end = incoming.span.start + incoming.content.len();
                    prev.content = &input[prev.span.start..content_end];
                    prev.span.end = incoming.span.end;
                    prev.subscript = incoming.subscript;
                    prev.superscript = incoming.superscript;
                    return;
                }
            }
            nodes.push(Node::Text(incoming));
            return;
        }
        nodes.push(node);
    }

    fn push_literal<'a>(nodes: &mut Vec<Node<'a>>, span: Span, input: &'a str) {
        let node = Node::Text(TextNode {
            content: span.slice(input),
            subscript: None,
            superscript: None,
            span,
        });
        Self::push_node(nodes, node, input);
    }

    fn span_of(pair: &Pair<'_, Rule>) -> Span {
        let span = pair.as_span();
        Span::new(span.start(), span.end())
    }
}

/// Parse a mixed text/LaTeX string into nodes.
pub fn parse_latex(text: &str) -> Result<Vec<Node<'_>>> {
    LatexParser::parse_input(text)
}

/// Collect the name of every macro in `text`, however deeply nested in
/// arguments, scripts or math segments.
pub fn enumerate_macros(text: &str) -> Result<HashSet<&str>> {
    let nodes = LatexParser::parse_input(text)?;
    let mut names = HashSet::new();
    for node in &nodes {
        collect_macro_names(node, &mut names);
    }
    Ok(names)
}

fn collect_macro_names<'a>(node: &Node<'a>, names: &mut HashSet<&'a str>) {
    match node {
        Node::Macro(node) => {
            names.insert(node.name);
            for group in node
                .arguments
                .iter()
                .chain(node.subscript.iter())
                .chain(node.superscript.iter())
            {
                collect_from_group(group, names);
            }
        }
        Node::Text(node) => {
            for group in node.subscript.iter().chain(node.superscript.iter()) {
                collect_from_group(group, names);
            }
        }
        Node::Math(node) => {
            for child in &node.content {
                collect_macro_names(child, names);
            }
        }
    }
}

fn collect_from_group<'a>(group: &GroupNode<'a>, names: &mut HashSet<&'a str>) {
    for node in &group.nodes {
        collect_macro_names(node, names);
    }
}
