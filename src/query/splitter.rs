//! Statement splitting and leading-keyword inspection.
//!
//! Statement boundaries come from the sqlparser tokenizer, so quoting,
//! comments and dollar-quoted bodies never split a statement. Inside a
//! `CREATE` statement, `BEGIN ... END` blocks (trigger and procedure bodies)
//! are kept whole.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Location, Token, TokenWithLocation, Tokenizer};
use tracing::debug;

/// Keywords that open a nested block inside a `BEGIN ... END` body.
const NESTED_BLOCKS: &[&str] = &["CASE"];

/// Keywords that may follow `END` and belong to it (`END IF`, `END LOOP`).
const END_SUFFIXES: &[&str] = &["IF", "LOOP", "WHILE", "REPEAT", "FOR", "CASE"];

/// Splits `sql` on top-level semicolons.
///
/// Each statement keeps its terminating semicolon; statements that are empty
/// once comments and whitespace are ignored are dropped. Text the tokenizer
/// rejects (e.g. an unterminated string) is returned as one statement so the
/// driver reports the problem.
pub fn split_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!("Cannot tokenize payload, running it as one statement: {}", e);
            let mut statements = Vec::new();
            push_statement(&mut statements, sql);
            return statements;
        }
    };

    let chars: Vec<char> = sql.chars().collect();
    let offsets = LineOffsets::new(&chars);
    let mut statements = Vec::new();
    let mut start = 0;
    let mut block = BlockTracker::default();

    for (index, token) in tokens.iter().enumerate() {
        match &token.token {
            Token::SemiColon if block.depth == 0 => {
                let end = (offsets.char_index(&token.location) + 1).min(chars.len());
                let text: String = chars[start..end].iter().collect();
                push_statement(&mut statements, &text);
                start = end;
                block = BlockTracker::default();
            }
            Token::Word(word) if word.quote_style.is_none() => {
                block.word(&word.value.to_uppercase(), next_word(&tokens[index + 1..]));
            }
            _ => {}
        }
    }
    if start < chars.len() {
        let text: String = chars[start..].iter().collect();
        push_statement(&mut statements, &text);
    }

    statements
}

/// Nesting of `BEGIN ... END` blocks in the statement being scanned.
#[derive(Debug, Default)]
struct BlockTracker {
    /// Whether the statement's first word is `CREATE`.
    create: Option<bool>,
    depth: usize,
    /// Set after `END` when the next word (`END IF`, `END CASE`) belongs to it.
    skip_next: bool,
}

impl BlockTracker {
    fn word(&mut self, word: &str, next: Option<String>) {
        let create = *self.create.get_or_insert(word == "CREATE");
        if self.skip_next {
            self.skip_next = false;
            return;
        }
        if !create {
            return;
        }

        match word {
            "BEGIN" => self.depth += 1,
            "END" if self.depth > 0 => {
                match next.as_deref() {
                    Some("CASE") => self.depth -= 1,
                    Some(suffix) if END_SUFFIXES.contains(&suffix) => {}
                    _ => self.depth -= 1,
                }
                self.skip_next = next.as_deref().is_some_and(|n| END_SUFFIXES.contains(&n));
            }
            nested if self.depth > 0 && NESTED_BLOCKS.contains(&nested) => self.depth += 1,
            _ => {}
        }
    }
}

/// The next unquoted word, upper-cased, skipping whitespace and comments.
fn next_word(tokens: &[TokenWithLocation]) -> Option<String> {
    tokens
        .iter()
        .find(|t| !matches!(t.token, Token::Whitespace(_)))
        .and_then(|t| match &t.token {
            Token::Word(word) if word.quote_style.is_none() => Some(word.value.to_uppercase()),
            _ => None,
        })
}

/// Maps tokenizer locations (1-based line and column) to char indexes.
struct LineOffsets {
    starts: Vec<usize>,
}

impl LineOffsets {
    fn new(chars: &[char]) -> Self {
        let mut starts = vec![0];
        starts.extend(
            chars
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    fn char_index(&self, location: &Location) -> usize {
        let line = (location.line as usize).saturating_sub(1);
        let start = self.starts.get(line).copied().unwrap_or_default();
        start + (location.column as usize).saturating_sub(1)
    }
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let text = text.trim();
    let meaningful = strip_leading_comments(text).trim_end_matches(';').trim();
    if !meaningful.is_empty() {
        statements.push(text.to_string());
    }
}

/// Drops leading whitespace and `--` / `/* */` comments.
pub fn strip_leading_comments(statement: &str) -> &str {
    let mut rest = statement.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |pos| &after[pos + 1..]).trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |pos| &after[pos + 2..]).trim_start();
        } else {
            return rest;
        }
    }
}

/// The first word of a statement, lower-cased, ignoring leading comments.
pub fn first_keyword(statement: &str) -> Option<String> {
    strip_leading_comments(statement)
        .split(|c: char| c.is_whitespace() || c == ';' || c == '(')
        .find(|word| !word.is_empty())
        .map(str::to_lowercase)
}

/// Whether the statement opens an explicit transaction.
pub fn is_transaction_start(statement: &str) -> bool {
    match first_keyword(statement).as_deref() {
        Some("begin") => true,
        Some("start") => strip_leading_comments(statement)
            .split_whitespace()
            .nth(1)
            .is_some_and(|word| word.trim_end_matches(';').eq_ignore_ascii_case("transaction")),
        _ => false,
    }
}

/// Whether the statement is a backslash meta-command (`\dt`, `\d name`).
pub fn is_meta_command(statement: &str) -> bool {
    strip_leading_comments(statement).starts_with('\\')
}
