//! Statement splitting and normalization for multi-query input files.

use std::sync::LazyLock;

use regex::Regex;

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--[^\n]*").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexer {
    Code,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment
}

/// Split SQL text into individual statements on `;`.
///
/// Semicolons inside quoted strings, quoted identifiers and comments do not
/// terminate a statement. Each returned piece is trimmed and keeps its
/// trailing semicolon; pieces that are empty or a lone `;` are dropped.
pub fn split_queries(sql: &str) -> Vec<String> {
    let mut queries = Vec::new();
    let mut current = String::new();
    let mut state = Lexer::Code;
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        current.push(ch);
        let next = chars.peek().copied();
        state = match (state, ch) {
            (Lexer::Code, '-') if next == Some('-') => Lexer::LineComment,
            (Lexer::Code, '/') if next == Some('*') => {
                current.push('*');
                chars.next();
                Lexer::BlockComment
            }
            (Lexer::Code, '\'') => Lexer::SingleQuote,
            (Lexer::Code, '"') => Lexer::DoubleQuote,
            (Lexer::Code, ';') => {
                flush(&mut current, &mut queries);
                Lexer::Code
            }
            (Lexer::SingleQuote, '\'') | (Lexer::DoubleQuote, '"') => Lexer::Code,
            (Lexer::LineComment, '\n') => Lexer::Code,
            (Lexer::BlockComment, '*') if next == Some('/') => {
                current.push('/');
                chars.next();
                Lexer::Code
            }
            (state, _) => state
        };
    }
    flush(&mut current, &mut queries);
    queries
}

fn flush(current: &mut String, queries: &mut Vec<String>) {
    let query = current.trim();
    if !query.is_empty() && query != ";" {
        queries.push(query.to_string());
    }
    current.clear();
}

/// Strip comments and collapse whitespace into single spaces.
pub fn normalize_query(sql: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(sql, "");
    let without_lines = LINE_COMMENT.replace_all(&without_blocks, "");
    without_lines.split_whitespace().collect::<Vec<_>>().join(" ")
}
