//! `{{name}}` placeholder expansion.

use crate::variables::Variables;
use regex::Regex;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
            .expect("static pattern is valid")
    })
}

/// Substitutes every `{{name}}` with the bound variable's text.
///
/// Unbound names expand to an empty string.
pub fn expand(template: &str, variables: &Variables) -> String {
    placeholder()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            variables.text(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
