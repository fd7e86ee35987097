//! `roster` command line: create stores, import flat files, register export
//! rules and render the primary table to a workbook.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use roster_db::{EnumKeyValue, LocalDb, RosterError, SpecRosterConfig, SpecRuleRequest};
use tracing_subscriber::EnvFilter;

////////////////////////////////////////////////////////////////////////////////
// #region CliTypes

#[derive(Parser, Debug)]
#[command(name = "roster", version, about = "Student record store with rule-based spreadsheet export")]
struct Cli {
    /// Root holding `data/`, `databases/` and `exports/` (overrides the config file).
    #[arg(long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,
    /// TOML configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty store and declare the primary table.
    Create {
        /// Database name; `.db` is appended when missing.
        db: String,
    },
    /// Load a `.csv`, `.ipc` or `.arrow` file into a table.
    Import {
        db: String,
        file: PathBuf,
        /// Destination table (defaults to the file stem).
        #[arg(long)]
        table: Option<String>,
    },
    /// Register a conditional fill rule for the export.
    AddRule(AddRuleArgs),
    /// Record how a table joins against the primary table.
    Relate {
        db: String,
        table: String,
        /// Columns matched against the primary table.
        #[arg(long = "join", required = true, value_delimiter = ',')]
        join_columns: Vec<String>,
        /// Columns pulled from the joined table.
        #[arg(long = "pull", value_delimiter = ',')]
        pull_columns: Vec<String>,
    },
    /// Map a secondary table column onto a primary table column.
    Subject {
        db: String,
        foreign_column: String,
        primary_column: String,
    },
    /// Render the primary table with its fills to `exports/<db>/`.
    #[command(alias = "export-all-students")]
    Export { db: String },
}

#[derive(Args, Debug)]
struct AddRuleArgs {
    db: String,
    /// Column whose cells get filled.
    column: String,
    /// Column selecting the rows.
    #[arg(long = "key-column")]
    key_column: String,
    /// Selecting value; read as an integer only when the key column is integral.
    #[arg(long = "key-value")]
    key_value: String,
    /// One of `<`, `<=`, `>`, `>=`, `< value <`, `<= value <=`, `> value >`, `>= value >=`.
    #[arg(long = "op", default_value = "<")]
    operator: String,
    #[arg(long = "val-1", allow_negative_numbers = true)]
    bound_1: Option<i64>,
    #[arg(long = "val-2", allow_negative_numbers = true)]
    bound_2: Option<i64>,
    /// `RRGGBB` or `AARRGGBB`.
    #[arg(long)]
    color: Option<String>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("roster: {err}");
            ExitCode::FAILURE
        }
    }
}

fn derive_config(cli: &Cli) -> Result<SpecRosterConfig, RosterError> {
    let mut config = match &cli.config {
        Some(path_toml) => SpecRosterConfig::from_toml_file(path_toml)?,
        None => SpecRosterConfig::default(),
    };
    if let Some(dir_root) = &cli.root {
        config.dir_root = dir_root.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), RosterError> {
    let config = derive_config(&cli)?;
    match cli.command {
        Commands::Create { db } => {
            let db = LocalDb::create(&config, &db)?;
            println!("{} created at {}.", db.db_name(), db.path_file_store().display());
        }
        Commands::Import { db, file, table } => {
            let db = LocalDb::open(&config, &db)?;
            let report = db.import_file(&file, table.as_deref())?;
            println!("{report}");
        }
        Commands::AddRule(args) => {
            let db = LocalDb::open(&config, &args.db)?;
            let rule = db.add_export_param(&SpecRuleRequest {
                column: args.column.clone(),
                key_column: args.key_column,
                key_value: EnumKeyValue::from_raw(&args.key_value),
                operator: args.operator,
                bound_1: args.bound_1,
                bound_2: args.bound_2,
                color: args.color,
            })?;
            println!(
                "rule on {}: {} = {}, {} -> {}",
                args.column, rule.key_column, rule.key_value, rule.operator, rule.color
            );
        }
        Commands::Relate {
            db,
            table,
            join_columns,
            pull_columns,
        } => {
            LocalDb::open(&config, &db)?.add_relationship(&table, &join_columns, &pull_columns)?;
        }
        Commands::Subject {
            db,
            foreign_column,
            primary_column,
        } => {
            LocalDb::open(&config, &db)?.add_subject(&foreign_column, &primary_column)?;
        }
        Commands::Export { db } => {
            let report = LocalDb::open(&config, &db)?.export_all_students()?;
            println!("{report}");
        }
    }
    Ok(())
}
