use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, SchemaError};

lazy_static! {
    static ref TOKEN_REGEX: Regex = Regex::new(
        r"(/\*[\s\S]*?\*/|//[^\n]*|0[xX][0-9A-Fa-f]+\b|-?\d+\b|\b[A-Za-z_][A-Za-z0-9_]*\b|[{}\[\];:=,]|\s+)"
    )
    .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.text.is_empty()
    }
}

/// Split schema text into tokens, dropping whitespace and comments.
///
/// The returned list always ends with an empty end-of-file token.
pub fn tokenize(text: &str, file: &Path) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    let unexpected = |fragment: &str, line: usize, column: usize| {
        let shown: String = fragment.chars().take(16).collect();
        SchemaError::Syntax {
            file: file.to_path_buf(),
            line,
            column,
            message: format!("unexpected input {shown:?}"),
        }
    };

    for mat in TOKEN_REGEX.find_iter(text) {
        if mat.start() > last_end {
            return Err(unexpected(&text[last_end..mat.start()], line, column));
        }

        let part = mat.as_str();
        let skip = part.starts_with("/*")
            || part.starts_with("//")
            || part.chars().all(char::is_whitespace);
        if !skip {
            tokens.push(Token {
                text: part.to_string(),
                line,
                column,
            });
        }

        let newlines = part.matches('\n').count();
        if newlines > 0 {
            line += newlines;
            column = part.rsplit('\n').next().map_or(0, str::len) + 1;
        } else {
            column += part.len();
        }
        last_end = mat.end();
    }

    if last_end != text.len() {
        return Err(unexpected(&text[last_end..], line, column));
    }

    tokens.push(Token {
        text: String::new(),
        line,
        column,
    });
    Ok(tokens)
}

/// Parse a decimal, negative decimal or hexadecimal integer literal.
pub fn parse_integer(text: &str) -> Option<i128> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i128::from_str_radix(hex, 16).ok();
    }
    text.parse().ok()
}
