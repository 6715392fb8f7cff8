//! Header flag parsing.

use super::tokenizer::{self, Token};
use crate::error::{CellError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Connections,
    Close,
    Creator,
    Section,
    Persist,
    PersistReplace,
    NoIndex,
    Append,
    ConnectionArguments,
    File,
    Save,
    With,
    NoExecute,
    Alias,
    Interact,
}

struct FlagSpec {
    flag: Flag,
    long: &'static [&'static str],
    short: Option<char>,
    takes_value: bool,
}

const FLAGS: &[FlagSpec] = &[
    FlagSpec { flag: Flag::Connections, long: &["connections"], short: Some('l'), takes_value: false },
    FlagSpec { flag: Flag::Close, long: &["close"], short: Some('x'), takes_value: true },
    FlagSpec { flag: Flag::Creator, long: &["creator"], short: Some('c'), takes_value: true },
    FlagSpec { flag: Flag::Section, long: &["section"], short: Some('s'), takes_value: true },
    FlagSpec { flag: Flag::Persist, long: &["persist"], short: Some('p'), takes_value: false },
    FlagSpec { flag: Flag::PersistReplace, long: &["persist-replace"], short: Some('P'), takes_value: false },
    FlagSpec { flag: Flag::NoIndex, long: &["no-index"], short: Some('n'), takes_value: false },
    FlagSpec { flag: Flag::Append, long: &["append"], short: None, takes_value: false },
    FlagSpec {
        flag: Flag::ConnectionArguments,
        long: &["connection_arguments", "connection-arguments"],
        short: Some('a'),
        takes_value: true,
    },
    FlagSpec { flag: Flag::File, long: &["file"], short: Some('f'), takes_value: true },
    FlagSpec { flag: Flag::Save, long: &["save"], short: Some('S'), takes_value: true },
    FlagSpec { flag: Flag::With, long: &["with"], short: Some('w'), takes_value: true },
    FlagSpec { flag: Flag::NoExecute, long: &["no-execute"], short: Some('N'), takes_value: false },
    FlagSpec { flag: Flag::Alias, long: &["alias"], short: Some('A'), takes_value: true },
    FlagSpec { flag: Flag::Interact, long: &["interact"], short: None, takes_value: true },
];

/// Returns true if `option` (e.g. `--file`) is a recognised long flag.
pub fn is_known_flag(option: &str) -> bool {
    option
        .strip_prefix("--")
        .is_some_and(|name| FLAGS.iter().any(|spec| spec.long.contains(&name)))
}

/// Flags and positional words of one header line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    /// Positional words (connection, shovel target and SQL), quotes preserved.
    pub line: Vec<String>,
    pub connections: bool,
    pub close: Option<String>,
    pub creator: Option<String>,
    pub section: Option<String>,
    pub persist: bool,
    pub persist_replace: bool,
    pub no_index: bool,
    pub append: bool,
    pub connection_arguments: Option<String>,
    pub file: Option<String>,
    pub save: Option<String>,
    pub with_: Vec<String>,
    pub no_execute: bool,
    pub alias: Option<String>,
    pub interact: Vec<String>,
}

impl CommandArgs {
    /// Parses a header line. A trailing SQL comment is dropped first.
    pub fn parse(header: &str) -> Result<Self> {
        let stripped = tokenizer::strip_sql_comment(header, is_known_flag);
        let words = tokenizer::split_words(&stripped);
        let mut tokens = tokenizer::tokenize(&words).into_iter();
        let mut args = Self::default();

        while let Some(token) = tokens.next() {
            let (spec, attached, shown) = match token {
                Token::Word(word) => {
                    args.line.push(word);
                    continue;
                }
                Token::LongFlag { name, value } => {
                    let spec = FLAGS
                        .iter()
                        .find(|spec| spec.long.contains(&name.as_str()))
                        .ok_or_else(|| CellError::usage(format!("unrecognized argument: --{name}")))?;
                    (spec, value, format!("--{name}"))
                }
                Token::ShortFlag { flag, value } => {
                    let spec = FLAGS
                        .iter()
                        .find(|spec| spec.short == Some(flag))
                        .ok_or_else(|| CellError::usage(format!("unrecognized argument: -{flag}")))?;
                    (spec, value, format!("-{flag}"))
                }
            };

            let value = if spec.takes_value {
                let value = match attached {
                    Some(value) => value,
                    None => match tokens.next() {
                        Some(Token::Word(word)) => word,
                        _ => {
                            return Err(CellError::usage(format!(
                                "argument {shown}: expected one argument"
                            )))
                        }
                    },
                };
                Some(unquote(&value))
            } else {
                if attached.is_some() {
                    return Err(CellError::usage(format!(
                        "argument {shown}: ignored explicit argument"
                    )));
                }
                None
            };

            args.apply(spec.flag, value);
        }

        if args.persist_replace && args.append {
            return Err(CellError::usage(
                "You cannot simultaneously persist and append data to a dataframe; please choose to utilize either one or the other.",
            ));
        }

        Ok(args)
    }

    fn apply(&mut self, flag: Flag, value: Option<String>) {
        match flag {
            Flag::Connections => self.connections = true,
            Flag::Close => self.close = value,
            Flag::Creator => self.creator = value,
            Flag::Section => self.section = value,
            Flag::Persist => self.persist = true,
            Flag::PersistReplace => self.persist_replace = true,
            Flag::NoIndex => self.no_index = true,
            Flag::Append => self.append = true,
            Flag::ConnectionArguments => self.connection_arguments = value,
            Flag::File => self.file = value,
            Flag::Save => self.save = value,
            Flag::With => {
                let names = value.unwrap_or_default();
                self.with_.extend(
                    names
                        .split(',')
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string),
                );
            }
            Flag::NoExecute => self.no_execute = true,
            Flag::Alias => self.alias = value,
            Flag::Interact => self.interact.extend(value),
        }
    }

    /// True when any of the persist modes was requested.
    pub fn wants_persist(&self) -> bool {
        self.persist || self.persist_replace || self.append
    }
}

/// Removes one level of matching surrounding quotes from a flag value.
fn unquote(value: &str) -> String {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_only() {
        let args = CommandArgs::parse("some-argument").unwrap();
        assert_eq!(
            args,
            CommandArgs {
                line: line(&["some-argument"]),
                ..CommandArgs::default()
            }
        );
    }

    #[test]
    fn test_file_flag_after_positionals() {
        let args = CommandArgs::parse("a b c --file query.sql").unwrap();
        assert_eq!(args.line, line(&["a", "b", "c"]));
        assert_eq!(args.file.as_deref(), Some("query.sql"));
    }

    #[test]
    fn test_short_and_equals_forms() {
        let args = CommandArgs::parse("-l -x warehouse --alias=prod -sdev").unwrap();
        assert!(args.connections);
        assert_eq!(args.close.as_deref(), Some("warehouse"));
        assert_eq!(args.alias.as_deref(), Some("prod"));
        assert_eq!(args.section.as_deref(), Some("dev"));
        assert!(args.line.is_empty());
    }

    #[test]
    fn test_with_is_repeatable_and_comma_separated() {
        let args = CommandArgs::parse("--with a,b -w c SELECT * FROM c").unwrap();
        assert_eq!(args.with_, line(&["a", "b", "c"]));
        assert_eq!(args.line, line(&["SELECT", "*", "FROM", "c"]));
    }

    #[test]
    fn test_save_and_no_execute() {
        let args = CommandArgs::parse("--save my_query --no-execute SELECT 1").unwrap();
        assert_eq!(args.save.as_deref(), Some("my_query"));
        assert!(args.no_execute);
    }

    #[test]
    fn test_persist_flags() {
        let args = CommandArgs::parse("--persist-replace -n df").unwrap();
        assert!(args.persist_replace);
        assert!(args.no_index);
        assert!(args.wants_persist());
        assert_eq!(args.line, line(&["df"]));
    }

    #[test]
    fn test_persist_replace_with_append_rejected() {
        let err = CommandArgs::parse("--persist-replace --append df").unwrap_err();
        assert!(matches!(err, CellError::Usage(_)));
    }

    #[test]
    fn test_connection_arguments_unquoted() {
        let args =
            CommandArgs::parse(r#"--connection_arguments '{"sslmode": "require"}' postgres://h/db"#);
        // Quoted values with spaces stay one word
        let args = args.unwrap();
        assert_eq!(
            args.connection_arguments.as_deref(),
            Some(r#"{"sslmode": "require"}"#)
        );
        assert_eq!(args.line, line(&["postgres://h/db"]));
    }

    #[test]
    fn test_unknown_short_flag() {
        let err = CommandArgs::parse("-z SELECT 1").unwrap_err();
        assert_eq!(err, CellError::usage("unrecognized argument: -z"));
    }

    #[test]
    fn test_unknown_long_flag_is_treated_as_comment() {
        let args = CommandArgs::parse("SELECT 1 --nope").unwrap();
        assert_eq!(args.line, line(&["SELECT", "1"]));
    }

    #[test]
    fn test_missing_value() {
        let err = CommandArgs::parse("--file").unwrap_err();
        assert_eq!(err, CellError::usage("argument --file: expected one argument"));
    }

    #[test]
    fn test_interact_repeatable() {
        let args = CommandArgs::parse("--interact x --interact y SELECT {{x}}").unwrap();
        assert_eq!(args.interact, line(&["x", "y"]));
    }
}
