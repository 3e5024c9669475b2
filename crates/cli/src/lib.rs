pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use crate::commands::{contract::ContractInput, price::PriceInput, split_list, CommandResult};

#[derive(Debug, Parser)]
#[command(
    name = "soundchain",
    about = "SoundChain licensing operator CLI",
    long_about = "Price licenses, check usage rights, draft contracts, and inspect runtime \
                  configuration.",
    after_help = "Examples:\n  soundchain price --base 50 --rights youtube,commercial\n  soundchain rights --requested youtube,film --allowed youtube,streaming\n  soundchain doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct TermsArgs {
    #[arg(long, default_value = "", help = "Comma separated usage rights, e.g. youtube,commercial")]
    rights: String,
    #[arg(long, help = "regional, national or worldwide")]
    territory: Option<String>,
    #[arg(long, help = "Price an exclusive license")]
    exclusive: bool,
    #[arg(long, help = "License duration in months; perpetual when omitted")]
    months: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Compute a deterministic license price breakdown")]
    Price {
        #[arg(long, help = "Producer base price in USD")]
        base: Decimal,
        #[command(flatten)]
        terms: TermsArgs,
    },
    #[command(about = "Check requested usage rights against an allowed set")]
    Rights {
        #[arg(long, help = "Comma separated rights the buyer asks for")]
        requested: String,
        #[arg(long, help = "Comma separated rights the producer allows")]
        allowed: String,
    },
    #[command(about = "Draft a license contract and report any price floor violation")]
    Contract {
        #[arg(long, help = "Agreed price in USD")]
        price: Decimal,
        #[arg(long, help = "Producer minimum price; enables the floor check")]
        base: Option<Decimal>,
        #[arg(long, help = "Omit the attribution requirement")]
        no_attribution: bool,
        #[arg(long, help = "License start as RFC 3339; defaults to now")]
        start: Option<DateTime<Utc>>,
        #[command(flatten)]
        terms: TermsArgs,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config {
        #[arg(long, help = "Path to a soundchain.toml file")]
        config: Option<PathBuf>,
    },
    #[command(about = "Validate config, backend credentials, and the pricing engine")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, help = "Path to a soundchain.toml file")]
        config: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Price { base, terms } => commands::price::run(&PriceInput {
            base,
            rights: split_list(&terms.rights),
            territory: terms.territory.unwrap_or_else(|| "worldwide".to_string()),
            exclusive: terms.exclusive,
            months: terms.months,
        }),
        Command::Rights { requested, allowed } => {
            commands::rights::run(&split_list(&requested), &split_list(&allowed))
        }
        Command::Contract { price, base, no_attribution, start, terms } => {
            commands::contract::run(&ContractInput {
                price,
                rights: split_list(&terms.rights),
                territory: terms.territory,
                exclusive: terms.exclusive,
                months: terms.months,
                no_attribution,
                base,
                starts_at: start.unwrap_or_else(Utc::now),
            })
        }
        Command::Config { config } => CommandResult {
            exit_code: 0,
            output: commands::config::run(commands::load_options(config)),
        },
        Command::Doctor { json, config } => CommandResult {
            exit_code: 0,
            output: commands::doctor::run(commands::load_options(config), json),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
