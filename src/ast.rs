/// Byte range into the source string.
///
/// Top-level node spans tile the input: concatenating the spans of a parse
/// result, in order, reconstructs the source exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The source text this span covers.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Parsed node
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'a> {
    /// Literal text run
    Text(TextNode<'a>),
    /// Macro invocation: \name[options]{arguments}
    Macro(MacroNode<'a>),
    /// Math segment: $...$, $$...$$ or \[...\]
    Math(MathNode<'a>),
}

impl<'a> Node<'a> {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(node) => node.span,
            Node::Macro(node) => node.span,
            Node::Math(node) => node.span,
        }
    }

    /// The raw source this node (scripts included) was parsed from.
    pub fn source<'s>(&self, source: &'s str) -> &'s str {
        self.span().slice(source)
    }
}

/// Literal text run, with any `_{...}` / `^{...}` scripts that followed it.
/// `content` covers the run only; `span` extends over attached scripts.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode<'a> {
    pub content: &'a str,
    pub subscript: Option<GroupNode<'a>>,
    pub superscript: Option<GroupNode<'a>>,
    pub span: Span,
}

/// Macro invocation. Arguments are the braced groups in order, each one a
/// recursively parsed node sequence; options are the bracketed groups in
/// order, kept as raw text. `lexeme` is the macro's own source (name and
/// groups, scripts excluded), used to emit an unknown macro verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroNode<'a> {
    pub name: &'a str,
    pub options: Vec<&'a str>,
    pub arguments: Vec<GroupNode<'a>>,
    pub subscript: Option<GroupNode<'a>>,
    pub superscript: Option<GroupNode<'a>>,
    pub lexeme: &'a str,
    pub span: Span,
}

impl<'a> MacroNode<'a> {
    /// First option, if any. `\sqrt[3]{x}` keeps `"3"` here.
    pub fn first_option(&self) -> Option<&'a str> {
        self.options.first().copied()
    }
}

/// Delimiter pair of a math segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathDelim {
    /// $...$
    Inline,
    /// $$...$$
    Display,
    /// \[...\]
    Bracket,
}

impl MathDelim {
    pub const fn open(&self) -> &'static str {
        match self {
            MathDelim::Inline => "$",
            MathDelim::Display => "$$",
            MathDelim::Bracket => "\\[",
        }
    }

    pub const fn close(&self) -> &'static str {
        match self {
            MathDelim::Inline => "$",
            MathDelim::Display => "$$",
            MathDelim::Bracket => "\\]",
        }
    }
}

/// Math segment. Delimiters do not suppress macro recognition: the content
/// is a fully parsed node sequence, and the delimiters are re-emitted on
/// output.
#[derive(Debug, Clone, PartialEq)]
pub struct MathNode<'a> {
    pub delim: MathDelim,
    pub content: Vec<Node<'a>>,
    pub span: Span,
}

/// Ordered node sequence with its own source span: a macro argument or a
/// script body. For argument groups the span includes the braces.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode<'a> {
    pub nodes: Vec<Node<'a>>,
    pub span: Span,
}
