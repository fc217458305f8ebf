use super::literal::Literal;
use crate::error::CompileResult;

/// Nesting step used inside multi-line JSON literals.
const JSON_STEP: usize = 2;

/// Rendering position carried between expressions.
///
/// Indentation is emitted lazily: a line break only records that the next
/// non-empty text starts a line, so blank lines never carry trailing spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Current indentation depth in spaces.
    pub indent: usize,
    /// Whether the next text begins a fresh line.
    pub line_start: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            indent: 0,
            line_start: true,
        }
    }
}

/// Output of rendering one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Produced template text.
    pub text: String,
    /// Context after rendering.
    pub context: Context,
}

/// Immutable, text-producing template expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Verbatim text.
    Text(String),
    /// Parts rendered in order, threading the context.
    Concat(Vec<Expr>),
    /// JSON encoding of a validated literal.
    Json(Literal),
    /// Increase indentation by the given width.
    Indent(usize),
    /// Decrease indentation by the given width.
    Unindent(usize),
    /// Line break.
    Line,
}

impl Expr {
    /// Verbatim text.
    pub fn text(text: impl Into<String>) -> Expr {
        Expr::Text(text.into())
    }

    /// Concatenate parts.
    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Concat(parts.into_iter().collect())
    }

    /// JSON encoding of `literal`; fails for values JSON cannot represent.
    pub fn json(literal: impl Into<Literal>) -> CompileResult<Expr> {
        let literal = literal.into();
        literal.validate()?;
        Ok(Expr::Json(literal))
    }

    /// Indent by two spaces.
    pub fn indent() -> Expr {
        Expr::Indent(2)
    }

    /// Unindent by two spaces.
    pub fn unindent() -> Expr {
        Expr::Unindent(2)
    }

    /// Line break.
    pub fn line() -> Expr {
        Expr::Line
    }

    /// `callee(arg, ...)`.
    pub fn call(callee: &str, args: impl IntoIterator<Item = Expr>) -> Expr {
        let mut parts = vec![Expr::text(format!("{callee}("))];
        for (idx, arg) in args.into_iter().enumerate() {
            if idx > 0 {
                parts.push(Expr::text(", "));
            }
            parts.push(arg);
        }
        parts.push(Expr::text(")"));
        Expr::Concat(parts)
    }

    /// `self.name(arg, ...)`.
    pub fn method(&self, name: &str, args: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::concat([self.clone(), Expr::call(&format!(".{name}"), args)])
    }

    /// `self.name`.
    pub fn dot(&self, name: &str) -> Expr {
        Expr::concat([self.clone(), Expr::text(format!(".{name}"))])
    }

    /// `left op right`.
    pub fn binary(left: &Expr, op: &str, right: &Expr) -> Expr {
        Expr::concat([left.clone(), Expr::text(format!(" {op} ")), right.clone()])
    }

    /// `(self)`.
    pub fn parens(&self) -> Expr {
        Expr::concat([Expr::text("("), self.clone(), Expr::text(")")])
    }

    /// The literal carried by a bare JSON expression.
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expr::Json(literal) => Some(literal),
            _ => None,
        }
    }

    /// Render starting from `context`.
    pub fn render(&self, context: Context) -> Rendered {
        let mut writer = Writer {
            out: String::new(),
            context,
        };
        writer.expr(self);
        Rendered {
            text: writer.out,
            context: writer.context,
        }
    }

    /// Render from the default context and keep only the text.
    pub fn to_text(&self) -> String {
        self.render(Context::default()).text
    }
}

struct Writer {
    out: String,
    context: Context,
}

impl Writer {
    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Text(text) => self.text(text),
            Expr::Concat(parts) => parts.iter().for_each(|part| self.expr(part)),
            Expr::Json(literal) => self.literal(literal),
            Expr::Indent(width) => self.context.indent += width,
            Expr::Unindent(width) => {
                self.context.indent = self.context.indent.saturating_sub(*width);
            }
            Expr::Line => self.line(),
        }
    }

    fn text(&mut self, text: &str) {
        for (idx, segment) in text.split('\n').enumerate() {
            if idx > 0 {
                self.line();
            }
            self.segment(segment);
        }
    }

    // Text without line breaks.
    fn segment(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.context.line_start {
            self.out.extend(std::iter::repeat_n(' ', self.context.indent));
        }
        self.out.push_str(text);
        self.context.line_start = false;
    }

    fn line(&mut self) {
        self.out.push('\n');
        self.context.line_start = true;
    }

    fn literal(&mut self, literal: &Literal) {
        if let Some(scalar) = literal.scalar_json() {
            self.text(&scalar);
            return;
        }
        match literal {
            Literal::List(items) if items.is_empty() => self.text("[]"),
            Literal::Map(entries) if entries.is_empty() => self.text("{}"),
            Literal::List(items) => {
                self.text("[");
                self.nested(items.iter().map(|item| (None, item)));
                self.text("]");
            }
            Literal::Map(entries) => {
                self.text("{");
                self.nested(entries.iter().map(|(key, value)| (Some(key.as_str()), value)));
                self.text("}");
            }
            _ => {}
        }
    }

    fn nested<'a>(&mut self, items: impl Iterator<Item = (Option<&'a str>, &'a Literal)>) {
        self.context.indent += JSON_STEP;
        for (idx, (key, value)) in items.enumerate() {
            if idx > 0 {
                self.text(",");
            }
            self.line();
            if let Some(key) = key {
                self.text(&super::literal::quote(key));
                self.text(": ");
            }
            self.literal(value);
        }
        self.context.indent -= JSON_STEP;
        self.line();
    }
}
