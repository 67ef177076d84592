//! Splitting SQL scripts into executable statements.
//!
//! The splitter scans the script once, tracking whether it is inside a quoted
//! literal or a comment, so delimiters and comment markers inside string
//! literals are left alone.

use std::fs;
use std::path::Path;

use crate::error::{Result, TesterError};

pub const DEFAULT_DELIMITER: &str = ";";
pub const DEFAULT_LINE_COMMENT: &str = "--";
pub const DEFAULT_BLOCK_COMMENT_START: &str = "/*";
pub const DEFAULT_BLOCK_COMMENT_END: &str = "*/";

/// Splits a script into statements with comments stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSplitter {
    delimiter: String,
    line_comment: String,
    block_comment_start: String,
    block_comment_end: String,
}

impl Default for ScriptSplitter {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            line_comment: DEFAULT_LINE_COMMENT.to_string(),
            block_comment_start: DEFAULT_BLOCK_COMMENT_START.to_string(),
            block_comment_end: DEFAULT_BLOCK_COMMENT_END.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

impl ScriptSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// An empty prefix disables line comments.
    pub fn with_line_comment(mut self, prefix: impl Into<String>) -> Self {
        self.line_comment = prefix.into();
        self
    }

    pub fn with_block_comment(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.block_comment_start = start.into();
        self.block_comment_end = end.into();
        self
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Read and split a script file.
    pub fn split_file(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let script = fs::read_to_string(path.as_ref())?;
        self.split(&script)
    }

    /// Split a script into trimmed, non-empty statements.
    ///
    /// Unterminated quoted literals and block comments are errors.
    pub fn split(&self, script: &str) -> Result<Vec<String>> {
        if self.delimiter.is_empty() {
            return Err(TesterError::invalid_argument(
                "Statement delimiter must not be empty",
            ));
        }
        if self.block_comment_start.is_empty() != self.block_comment_end.is_empty() {
            return Err(TesterError::invalid_argument(
                "Block comment start and end markers must both be set or both be empty",
            ));
        }

        let mut statements = Vec::new();
        let mut current = String::new();
        let mut state = State::Code;
        let mut line = 1;
        let mut opened_at = 1;
        let mut pos = 0;

        while let Some(ch) = script[pos..].chars().next() {
            let rest = &script[pos..];
            match state {
                State::Code => {
                    if starts_with(rest, &self.line_comment) {
                        state = State::LineComment;
                        pos += self.line_comment.len();
                        continue;
                    }
                    if starts_with(rest, &self.block_comment_start) {
                        state = State::BlockComment;
                        opened_at = line;
                        pos += self.block_comment_start.len();
                        continue;
                    }
                    if rest.starts_with(self.delimiter.as_str()) {
                        flush(&mut current, &mut statements);
                        line += self.delimiter.matches('\n').count();
                        pos += self.delimiter.len();
                        continue;
                    }
                    if ch == '\'' || ch == '"' {
                        state = State::Quoted(ch);
                        opened_at = line;
                    }
                    current.push(ch);
                }
                State::Quoted(quote) => {
                    current.push(ch);
                    if ch == quote {
                        // a doubled quote stays inside the literal
                        if rest[ch.len_utf8()..].starts_with(quote) {
                            current.push(quote);
                            pos += 2 * ch.len_utf8();
                            continue;
                        }
                        state = State::Code;
                    }
                }
                State::LineComment => {
                    if ch == '\n' {
                        current.push('\n');
                        state = State::Code;
                    }
                }
                State::BlockComment => {
                    if rest.starts_with(self.block_comment_end.as_str()) {
                        current.push(' ');
                        state = State::Code;
                        line += self.block_comment_end.matches('\n').count();
                        pos += self.block_comment_end.len();
                        continue;
                    }
                }
            }
            if ch == '\n' {
                line += 1;
            }
            pos += ch.len_utf8();
        }

        match state {
            State::Quoted(quote) => Err(TesterError::ScriptSyntax(format!(
                "unterminated {} literal starting at line {}",
                quote, opened_at
            ))),
            State::BlockComment => Err(TesterError::ScriptSyntax(format!(
                "unterminated block comment starting at line {}",
                opened_at
            ))),
            State::Code | State::LineComment => {
                flush(&mut current, &mut statements);
                Ok(statements)
            }
        }
    }
}

fn starts_with(text: &str, marker: &str) -> bool {
    !marker.is_empty() && text.starts_with(marker)
}

fn flush(current: &mut String, statements: &mut Vec<String>) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}
