use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::program::StashScope;
use crate::template::{Context, Expr};
use crate::value::TypedValue;

/// Per-field text accumulator shared by every nested block of the field.
///
/// Blocks opened with [`InterpreterState::open_block`] must be closed with
/// [`InterpreterState::close_block`] before control returns to the parent
/// level, so the buffered text is always balanced.
#[derive(Debug)]
pub struct InterpreterState {
    buffer: Vec<String>,
    context: Context,
    ids: HashMap<String, usize>,
    indent_width: usize,
    depth: usize,
}

impl InterpreterState {
    /// Fresh state; `indent_width` is the block indentation step.
    pub fn new(indent_width: usize) -> Self {
        Self {
            buffer: Vec::new(),
            context: Context::default(),
            ids: HashMap::new(),
            indent_width,
            depth: 0,
        }
    }

    /// Render `expr` at the current position and buffer the text.
    pub fn write(&mut self, expr: &Expr) {
        let rendered = expr.render(self.context);
        self.context = rendered.context;
        if !rendered.text.is_empty() {
            self.buffer.push(rendered.text);
        }
    }

    /// Break the line unless already at the start of one.
    pub fn ensure_line(&mut self) {
        if !self.context.line_start {
            self.write(&Expr::line());
        }
    }

    /// Next id for `prefix`, starting at 1.
    pub fn new_id(&mut self, prefix: &str) -> usize {
        let counter = self.ids.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Variable name for a stash: caller-supplied or generated from the scope.
    pub fn stash_name(&mut self, id: Option<&str>, scope: StashScope) -> CompileResult<String> {
        match id {
            Some(id) if !is_identifier(id) => Err(CompileError::InvalidIdentifier(id.to_string())),
            Some(id) => Ok(match scope {
                StashScope::Local => format!("${id}"),
                StashScope::Global => format!("$context.stash.{id}"),
            }),
            None => Ok(match scope {
                StashScope::Local => format!("$local{}", self.new_id("local")),
                StashScope::Global => format!("$context.stash.var{}", self.new_id("var")),
            }),
        }
    }

    /// Emit `#set(<name> = <value>)` and return a reference to `name`.
    pub fn stash(&mut self, value: &TypedValue, name: &str) -> CompileResult<TypedValue> {
        self.ensure_line();
        self.write(&Expr::concat([
            Expr::text(format!("#set({name} = ")),
            value.expr().clone(),
            Expr::text(")"),
            Expr::line(),
        ]));
        TypedValue::reference(value.shape().clone(), name)
    }

    /// Indent and start the body of a block.
    pub fn open_block(&mut self) {
        self.write(&Expr::concat([Expr::Indent(self.indent_width), Expr::line()]));
        self.depth += 1;
    }

    /// Finish the body of a block and return to the parent indentation.
    pub fn close_block(&mut self) {
        self.ensure_line();
        self.write(&Expr::Unindent(self.indent_width));
        self.depth = self.depth.saturating_sub(1);
    }

    /// Number of enclosing blocks.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether anything has been buffered since the last flush.
    pub fn is_empty(&self) -> bool {
        self.buffer.iter().all(|text| text.trim().is_empty())
    }

    /// Flush the buffer as raw text (possibly empty).
    pub fn take_text(&mut self) -> String {
        let text = self.buffer.concat();
        self.buffer.clear();
        self.context = Context {
            indent: self.context.indent,
            line_start: true,
        };
        text
    }

    /// Flush the buffer as a template; an empty buffer yields `{}`.
    pub fn render_template(&mut self) -> String {
        if self.is_empty() {
            self.take_text();
            "{}".to_string()
        } else {
            self.take_text()
        }
    }
}

fn is_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
