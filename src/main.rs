use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand};
use fxconv::cli::history::RecordInput;
use fxconv::core::log::init_logging;
use fxconv::{AppCommand, HistoryCommand};
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration file
    Setup {
        /// Replace an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Convert an amount between two currencies
    #[command(allow_negative_numbers = true)]
    Convert {
        /// Currency to convert from, e.g. USD
        base: String,
        /// Currency to convert to, e.g. EUR
        target: String,
        /// Amount in the base currency
        amount: Decimal,
    },
    /// Inspect or edit the conversion history
    #[command(subcommand)]
    History(HistoryCommands),
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List all recorded conversions
    List,
    /// Show a single conversion
    Show { id: u64 },
    /// Record a conversion manually
    #[command(allow_negative_numbers = true)]
    Add(RecordArgs),
    /// Overwrite a recorded conversion
    #[command(allow_negative_numbers = true)]
    Update {
        id: u64,
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Delete a recorded conversion
    Delete { id: u64 },
}

#[derive(Args)]
struct RecordArgs {
    base: String,
    target: String,
    amount: Decimal,
    converted_amount: Decimal,
    /// RFC 3339 timestamp, defaults to now
    #[arg(long)]
    timestamp: Option<DateTime<Utc>>,
}

impl From<RecordArgs> for RecordInput {
    fn from(args: RecordArgs) -> RecordInput {
        RecordInput {
            base: args.base,
            target: args.target,
            amount: args.amount,
            converted_amount: args.converted_amount,
            timestamp: args.timestamp,
        }
    }
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Convert {
                base,
                target,
                amount,
            } => AppCommand::Convert {
                base,
                target,
                amount,
            },
            Commands::History(history) => AppCommand::History(match history {
                HistoryCommands::List => HistoryCommand::List,
                HistoryCommands::Show { id } => HistoryCommand::Show { id },
                HistoryCommands::Add(record) => HistoryCommand::Add(record.into()),
                HistoryCommands::Update { id, record } => HistoryCommand::Update {
                    id,
                    record: record.into(),
                },
                HistoryCommands::Delete { id } => HistoryCommand::Delete { id },
            }),
            Commands::Setup { .. } => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup { force }) => {
            fxconv::cli::setup::setup(cli.config_path.as_deref(), force).map(|_| ())
        }
        Some(cmd) => fxconv::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
