//! Splits command text into connection token, shovel target and SQL.

use crate::config::Config;
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

/// The pieces of one command's text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellParts {
    /// Connection string named by the first word, or empty.
    pub connection: String,
    pub sql: String,
    pub result_var: Option<String>,
    pub return_result_var: bool,
}

/// Parses `text` as `[connection] [var[=] <<] sql`.
///
/// The first word is a connection when it contains `@` or `://` (after
/// environment expansion) or is a `[section]` reference into the config.
pub fn parse_cell(text: &str, config: &Config) -> Result<CellParts> {
    let mut parts = CellParts::default();

    let Some((first, rest)) = split_first_word(text) else {
        return Ok(parts);
    };

    let mut cell = text;
    parts.connection = connection_string(first, config)?;
    if !parts.connection.is_empty() {
        match rest {
            Some(rest) => cell = rest,
            None => return Ok(parts),
        }
    }

    if let Some((target, rest)) = split_first_word(cell) {
        if let Some((op, after)) = rest.and_then(split_first_word) {
            if op == "<<" {
                match target.strip_suffix('=') {
                    Some(name) => {
                        parts.result_var = Some(name.to_string());
                        parts.return_result_var = true;
                    }
                    None => parts.result_var = Some(target.to_string()),
                }
                match after {
                    Some(after) => cell = after,
                    None => return Ok(parts),
                }
            }
        }
    }

    parts.sql = cell.trim().to_string();
    Ok(parts)
}

/// Returns the first whitespace-delimited word and the remainder after the
/// whitespace that follows it.
fn split_first_word(text: &str) -> Option<(&str, Option<&str>)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(end) => {
            let rest = text[end..].trim_start();
            Some((&text[..end], (!rest.is_empty()).then_some(rest)))
        }
        None => Some((text, None)),
    }
}

fn connection_string(word: &str, config: &Config) -> Result<String> {
    let expanded = expand_env_vars(word);
    if expanded.contains('@') || expanded.contains("://") {
        return Ok(expanded);
    }
    if let Some(section) = expanded
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    {
        return config.section_connection_string(section);
    }
    Ok(String::new())
}

/// Expands `$VAR` and `${VAR}` from the environment, leaving unknown variables as written.
pub fn expand_env_vars(input: &str) -> String {
    static VAR: OnceLock<Regex> = OnceLock::new();
    let re = VAR.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("static pattern is valid")
    });

    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
