//! Command-line argument parsing for dbcell.

use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Bordered plain-text table, bounded by the display limit.
    #[default]
    Table,
    Csv,
    /// Array of row objects.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: table, csv, or json"
            )),
        }
    }
}

/// Run SQL cells against live database connections.
///
/// The header takes the same flags and connection syntax as a `%%sql` line,
/// e.g. `dbcell sqlite:// --save recent -- "SELECT * FROM t"`.
#[derive(Parser, Debug)]
#[command(name = "dbcell")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Cell header: connection, flags, and optionally the SQL itself
    #[arg(value_name = "HEADER", trailing_var_arg = true, allow_hyphen_values = true)]
    pub header: Vec<String>,

    /// Cell body (use "-" to read it from stdin)
    #[arg(short, long, value_name = "TEXT")]
    pub body: Option<String>,

    /// Run every cell of a script file in one session
    #[arg(long, value_name = "PATH", conflicts_with_all = ["header", "body"])]
    pub script: Option<PathBuf>,

    /// Output format: table, csv or json
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub format: String,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Fetch at most N rows (overrides the config file)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub autolimit: Option<i64>,

    /// Show at most N rows in tables (overrides the config file)
    #[arg(long, value_name = "N")]
    pub displaylimit: Option<usize>,

    /// Connection opened when a cell names none
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, value_name = "URL")]
    pub database_url: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(db_cell::config::Config::default_path)
    }

    /// Parses the output format from the --format argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.format.parse()
    }

    /// The header words joined back into one line.
    pub fn header_line(&self) -> String {
        self.header.join(" ")
    }

    /// The cell body, read from stdin when given as "-".
    pub fn read_body(&self) -> std::io::Result<String> {
        match self.body.as_deref() {
            Some("-") => {
                let mut body = String::new();
                std::io::stdin().read_to_string(&mut body)?;
                Ok(body)
            }
            Some(body) => Ok(body.to_string()),
            None => Ok(String::new()),
        }
    }
}
