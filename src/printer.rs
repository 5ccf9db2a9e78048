//! An append-only sink for generated Go source.

use std::fmt::Write;

/// Appends tab-indented lines of Go source to a buffer.
///
/// The printer never reads back what it wrote; each call emits one logical
/// unit (a line, a block delimiter, a run of literal fields).
pub struct Printer<'a> {
    buf: &'a mut String,
    depth: usize,
}

impl<'a> Printer<'a> {
    pub fn new(buf: &'a mut String) -> Printer<'a> {
        Printer { buf, depth: 0 }
    }

    /// Appends a single line at the current indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buf.push('\t');
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Appends a line opening a block, and indents what follows.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Closes a block opened by [`Printer::open`] with the given line.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Appends a `//` comment line.
    pub fn comment(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.line("//");
        } else {
            self.line(format!("// {}", text));
        }
    }

    /// Appends `if <cond> {`, the `return` statement and the closing brace.
    pub fn return_on_err(&mut self, cond: impl AsRef<str>, ret: impl AsRef<str>) {
        self.open(format!("if {} {{", cond.as_ref()));
        self.line(format!("return {}", ret.as_ref()));
        self.close("}");
    }

    /// Appends a run of `Key: value,` lines of a composite literal, with the
    /// values aligned in one column.
    pub fn fields<K, V>(&mut self, fields: &[(K, V)])
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let width = fields
            .iter()
            .map(|(key, _)| key.as_ref().len())
            .max()
            .unwrap_or_default();

        for (key, value) in fields {
            let mut text = String::new();
            let _ = write!(
                text,
                "{:width$} {},",
                format!("{}:", key.as_ref()),
                value.as_ref(),
                width = width + 1
            );
            self.line(text);
        }
    }
}

/// Formats a Go interpreted string literal.
pub fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_ascii_control() => {
                let _ = write!(quoted, "\\x{:02x}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
