//! Dialect families and their execution capabilities.
//!
//! A `Dialect` is detected once when a connection is opened; the executor and the
//! snippet renderer consult its capabilities instead of matching on names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Groups of backends sharing syntax, quoting and transaction conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectFamily {
    Postgres,
    MySql,
    Sqlite,
    DuckDb,
    ClickHouse,
    BigQuery,
    Mssql,
    Athena,
    Teradata,
    Vertica,
    Ingres,
    Spark,
    Oracle,
    Snowflake,
    Other,
}

impl DialectFamily {
    /// Maps a dialect name (URL scheme without the driver suffix) to its family.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "redshift" => Self::Postgres,
            "mysql" | "mariadb" => Self::MySql,
            "sqlite" => Self::Sqlite,
            "duckdb" => Self::DuckDb,
            "clickhouse" => Self::ClickHouse,
            "bigquery" => Self::BigQuery,
            "mssql" | "tsql" => Self::Mssql,
            "athena" | "awsathena" => Self::Athena,
            "teradata" | "teradatasql" => Self::Teradata,
            "vertica" => Self::Vertica,
            "ingres" => Self::Ingres,
            "spark" | "hive" | "databricks" => Self::Spark,
            "oracle" => Self::Oracle,
            "snowflake" => Self::Snowflake,
            _ => Self::Other,
        }
    }

    fn default_capabilities(self) -> Capabilities {
        let mut caps = Capabilities::default();
        match self {
            Self::Postgres => caps.meta_commands = true,
            Self::MySql | Self::Sqlite | Self::Spark => caps.supports_backtick = true,
            Self::DuckDb => caps.native_frames = true,
            Self::ClickHouse | Self::BigQuery => {
                caps.supports_backtick = true;
                caps.rejects_explicit_commit = true;
            }
            Self::Mssql | Self::Athena | Self::Teradata | Self::Vertica | Self::Ingres => {
                caps.rejects_explicit_commit = true
            }
            Self::Oracle | Self::Snowflake | Self::Other => {}
        }
        caps
    }
}

/// Execution policy flags for one dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// CTE names may be quoted with backticks.
    pub supports_backtick: bool,

    /// Issuing COMMIT breaks the driver; never send one.
    pub rejects_explicit_commit: bool,

    /// Autocommit must stay off regardless of configuration.
    pub disables_autocommit: bool,

    /// The driver can materialize a columnar frame natively.
    pub native_frames: bool,

    /// Backslash meta-commands (`\dt`, `\d name`) are meaningful.
    pub meta_commands: bool,
}

/// How CTE names are quoted in a rendered chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierQuoting {
    #[default]
    None,
    Backtick,
}

impl IdentifierQuoting {
    /// Quotes an identifier.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Self::None => ident.to_string(),
            Self::Backtick => format!("`{ident}`"),
        }
    }
}

/// The dialect of an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Dialect name (e.g. `postgresql`).
    pub name: String,

    /// Driver name, if the URL named one (e.g. `pytds` in `mssql+pytds://`).
    pub driver: Option<String>,

    /// The family this dialect belongs to.
    pub family: DialectFamily,

    /// Execution capabilities.
    pub caps: Capabilities,
}

impl Dialect {
    /// Detects the dialect and its capabilities.
    pub fn detect(name: &str, driver: Option<&str>) -> Self {
        let family = DialectFamily::from_name(name);
        let mut caps = family.default_capabilities();

        if driver.is_some_and(|d| d.eq_ignore_ascii_case("pytds")) {
            caps.disables_autocommit = true;
        }

        Self {
            name: name.to_lowercase(),
            driver: driver.map(str::to_lowercase),
            family,
            caps,
        }
    }

    /// Detects the dialect from a URL scheme such as `mssql+pytds`.
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.split_once('+') {
            Some((name, driver)) => Self::detect(name, Some(driver)),
            None => Self::detect(scheme, None),
        }
    }

    /// Returns the quoting used for CTE names in rendered snippets.
    pub fn identifier_quoting(&self) -> IdentifierQuoting {
        if self.caps.supports_backtick {
            IdentifierQuoting::Backtick
        } else {
            IdentifierQuoting::None
        }
    }

    /// Returns true for the Postgres-compatible family.
    pub fn is_postgres_family(&self) -> bool {
        self.family == DialectFamily::Postgres
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.driver {
            Some(driver) => write!(f, "{}+{}", self.name, driver),
            None => write!(f, "{}", self.name),
        }
    }
}
