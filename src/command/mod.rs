//! Command parsing: header flags, connection and shovel detection, templates.

mod args;
mod cell;
mod parser;
mod template;
mod tokenizer;

pub use args::{is_known_flag, CommandArgs};
pub use cell::{expand_env_vars, parse_cell, CellParts};
pub use parser::{CommandParser, ConnectionRef, ParseContext, ParsedCommand};
pub use template::expand;
pub use tokenizer::{split_words, strip_sql_comment, tokenize, Token};
