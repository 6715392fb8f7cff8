//! dbcell - run SQL cells against live database connections.

mod cli;

use anyhow::Context;
use cli::{Cli, OutputFormat};
use db_cell::config::Config;
use db_cell::logging;
use db_cell::result::{CsvOptions, ResultSet};
use db_cell::script::{split_cells, Cell};
use db_cell::{Outcome, Reply, Session};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    match &cli.log_file {
        Some(path) => logging::init_file_logging(path),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.parse_output_format().map_err(anyhow::Error::msg)?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let mut session = Session::new(config).with_database_url(cli.database_url.clone());
    if let Some(autolimit) = cli.autolimit {
        session.settings_mut().autolimit = autolimit;
    }
    if let Some(displaylimit) = cli.displaylimit {
        session.settings_mut().displaylimit = displaylimit;
    }

    let cells = match &cli.script {
        Some(path) => {
            let script = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read script {}", path.display()))?;
            split_cells(&script)
        }
        None => vec![Cell {
            header: cli.header_line(),
            body: cli.read_body().context("Cannot read the cell body")?,
            line: 1,
        }],
    };

    let displaylimit = session.config().settings.displaylimit;
    let mut outcome = Ok(());
    for cell in &cells {
        match session.execute(&cell.header, &cell.body).await {
            Ok(reply) => print_reply(&reply, format, displaylimit)?,
            Err(e) => {
                let context = format!("{} failed (line {})", cell_label(&cell.header), cell.line);
                outcome = Err(anyhow::Error::new(e).context(context));
                break;
            }
        }
    }

    session.shutdown().await;
    outcome
}

fn cell_label(header: &str) -> String {
    if header.is_empty() {
        "Cell".to_string()
    } else {
        format!("Cell `{header}`")
    }
}

fn print_reply(reply: &Reply, format: OutputFormat, displaylimit: usize) -> anyhow::Result<()> {
    for notice in &reply.notices {
        match format {
            OutputFormat::Table => println!("{notice}"),
            OutputFormat::Csv | OutputFormat::Json => eprintln!("{notice}"),
        }
    }

    let rows = match &reply.outcome {
        Outcome::Nothing => return Ok(()),
        Outcome::Status(status) => {
            println!("{status}");
            return Ok(());
        }
        Outcome::Rows(rows) => rows.clone(),
        Outcome::Frame(frame) => ResultSet::from_frame(frame),
    };

    match format {
        OutputFormat::Table => println!("{}", rows.render_table(displaylimit)),
        OutputFormat::Csv => {
            if let Some(text) = rows.to_csv_string(&CsvOptions::default())? {
                print!("{text}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows.to_json())?),
    }
    Ok(())
}
