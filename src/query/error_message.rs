//! Friendlier messages for driver errors.
//!
//! Only consulted after a statement failed; a recognised error gets a detail
//! block that ends with the driver's original text.

use super::splitter::split_statements;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

const SYNTAX_ERROR: &str = "\nLooks like there is a syntax error in your query.";
const ORIGINAL_ERROR: &str = "\nOriginal error message from DB driver:\n";
const CONNECTING_GUIDE: &str = "https://jupysql.ploomber.io/en/latest/connecting.html";

/// Builds a detail message for a recognised driver error, or `None`.
///
/// Syntax errors are re-parsed statement by statement to locate the problem or
/// to suggest a normalized rendering of the query.
pub fn detail(original_error: &str, query: &str) -> Option<String> {
    if original_error.contains("syntax error") {
        let mut message = SYNTAX_ERROR.to_string();
        let reasons: String = split_statements(query)
            .iter()
            .filter_map(|statement| possible_reason(statement))
            .collect();
        if !reasons.is_empty() {
            message.push_str("Possible reason: \n");
            message.push_str(&reasons);
        }
        return Some(format!("{message}\n{ORIGINAL_ERROR}{original_error}\n"));
    }

    if original_error.contains("fe_sendauth: no password supplied") {
        return Some(format!(
            "\nLooks like you have run into some issues. \
             Review our DB connection via URL strings guide: {CONNECTING_GUIDE} .\
             {ORIGINAL_ERROR}{original_error}\n"
        ));
    }

    None
}

fn possible_reason(statement: &str) -> Option<String> {
    let statement = statement.trim();
    let statement = statement.strip_suffix(';').unwrap_or(statement).trim();

    match Parser::parse_sql(&GenericDialect {}, statement) {
        Ok(parsed) => {
            let rendered: Vec<String> = parsed.iter().map(ToString::to_string).collect();
            let unchanged = rendered
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(statement));
            if unchanged || rendered.is_empty() {
                None
            } else {
                Some(format!("Did you mean : {}\n", rendered.join("; ")))
            }
        }
        Err(e) => Some(format!("Syntax Error in {statement}: {e}\n")),
    }
}
