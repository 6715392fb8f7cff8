//! Tokenizer for command header parsing.
//!
//! Provides parsing of header lines with support for:
//! - Whitespace-separated words, with quoted sections kept verbatim (quotes included)
//! - Long flags (`--flag`, `--flag=value`)
//! - Short flags (`-f`, `-fvalue`)
//! - Stripping a trailing SQL comment that does not belong to a flag

/// A token parsed from a header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain word (part of the connection/SQL positional list).
    Word(String),
    /// A long flag (`--flag` or `--flag=value`).
    LongFlag { name: String, value: Option<String> },
    /// A short flag (`-f`, or `-fvalue` with an attached value).
    ShortFlag { flag: char, value: Option<String> },
}

impl Token {
    /// Returns the token as a word if it is one.
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this is a long flag with the given name.
    pub fn is_long_flag(&self, name: &str) -> bool {
        matches!(self, Token::LongFlag { name: n, .. } if n == name)
    }
}

/// Splits `input` on whitespace, keeping quoted sections (and their quotes) intact.
///
/// `SELECT 'a b' FROM t` yields `["SELECT", "'a b'", "FROM", "t"]`.
pub fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Drops everything from the first word that starts a SQL comment (`--...`)
/// unless that word is a known long flag.
///
/// `--persist my_table --uff da` becomes `--persist my_table`.
pub fn strip_sql_comment(line: &str, is_known_flag: impl Fn(&str) -> bool) -> String {
    split_words(line)
        .into_iter()
        .take_while(|word| {
            if !word.starts_with("--") {
                return true;
            }
            let name = word.split_once('=').map_or(word.as_str(), |(name, _)| name);
            is_known_flag(name)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classifies words into flags and positional words.
pub fn tokenize(words: &[String]) -> Vec<Token> {
    words.iter().map(|word| classify(word)).collect()
}

fn classify(word: &str) -> Token {
    if let Some(rest) = word.strip_prefix("--") {
        if !rest.is_empty() && rest.chars().next().is_some_and(char::is_alphabetic) {
            return match rest.split_once('=') {
                Some((name, value)) => Token::LongFlag {
                    name: name.to_string(),
                    value: Some(value.to_string()),
                },
                None => Token::LongFlag {
                    name: rest.to_string(),
                    value: None,
                },
            };
        }
        return Token::Word(word.to_string());
    }

    if let Some(rest) = word.strip_prefix('-') {
        let mut chars = rest.chars();
        if let Some(flag) = chars.next().filter(|c| c.is_ascii_alphabetic()) {
            let attached = chars.as_str();
            return Token::ShortFlag {
                flag,
                value: (!attached.is_empty()).then(|| attached.to_string()),
            };
        }
    }

    Token::Word(word.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn known(flag: &str) -> bool {
        matches!(
            flag,
            "--connections" | "--close" | "--creator" | "--section" | "--persist" | "--append"
                | "--connection_arguments" | "--file"
        )
    }

    #[test]
    fn test_split_words_keeps_quotes() {
        assert_eq!(
            split_words("SELECT 'a b'  FROM \"my table\""),
            vec!["SELECT", "'a b'", "FROM", "\"my table\""]
        );
    }

    #[test]
    fn test_split_words_across_newlines() {
        assert_eq!(split_words("\nsqlite://\ndest\n<<"), vec!["sqlite://", "dest", "<<"]);
    }

    #[test]
    fn test_split_words_escaped_quote() {
        assert_eq!(split_words(r#""say \"hi\"" x"#), vec![r#""say \"hi\"""#, "x"]);
    }

    #[test]
    fn test_strip_plain() {
        let line = "SELECT * FROM author";
        assert_eq!(strip_sql_comment(line, known), line);
    }

    #[test]
    fn test_strip_keeps_flags() {
        let line = "--file moo.txt --persist SELECT * FROM author";
        assert_eq!(strip_sql_comment(line, known), line);
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(
            strip_sql_comment("SELECT * FROM author -- uff da", known),
            "SELECT * FROM author"
        );
        assert_eq!(
            strip_sql_comment("SELECT * FROM author --uff da", known),
            "SELECT * FROM author"
        );
        assert_eq!(
            strip_sql_comment("--file moo.txt --persist SELECT * FROM author -- uff da", known),
            "--file moo.txt --persist SELECT * FROM author"
        );
    }

    #[test]
    fn test_strip_dashes_in_string() {
        assert_eq!(
            strip_sql_comment("SELECT '--very --confusing' FROM author -- uff da", known),
            "SELECT '--very --confusing' FROM author"
        );
    }

    #[test]
    fn test_strip_leading_comment_after_flags() {
        assert_eq!(
            strip_sql_comment("--file moo.txt --persist --comment, not arg", known),
            "--file moo.txt --persist"
        );
        assert_eq!(
            strip_sql_comment("--persist my_table --uff da", known),
            "--persist my_table"
        );
    }

    #[test]
    fn test_strip_flag_with_inline_value() {
        assert_eq!(
            strip_sql_comment("--file=moo.txt SELECT 1", known),
            "--file=moo.txt SELECT 1"
        );
    }

    #[test]
    fn test_tokenize() {
        let words = split_words("-l --file=q.sql --persist -xwarehouse -1 a-b --");
        assert_eq!(
            tokenize(&words),
            vec![
                Token::ShortFlag {
                    flag: 'l',
                    value: None
                },
                Token::LongFlag {
                    name: "file".to_string(),
                    value: Some("q.sql".to_string())
                },
                Token::LongFlag {
                    name: "persist".to_string(),
                    value: None
                },
                Token::ShortFlag {
                    flag: 'x',
                    value: Some("warehouse".to_string())
                },
                Token::Word("-1".to_string()),
                Token::Word("a-b".to_string()),
                Token::Word("--".to_string()),
            ]
        );
    }

    #[test]
    fn test_token_helpers() {
        let token = Token::LongFlag {
            name: "persist".to_string(),
            value: None,
        };
        assert!(token.is_long_flag("persist"));
        assert_eq!(token.as_word(), None);
        assert_eq!(Token::Word("x".into()).as_word(), Some("x"));
    }
}
