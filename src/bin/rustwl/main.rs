// main.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Root of the rustwl CLI.

mod filetypes;
mod info;
mod title;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rustwl", version, about = "A utility for handling files and formats used by the DSi", long_about = None, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a DSi file
    Info {
        /// The path to the file to show info about
        input: String,
    },
    /// Download data from the NUS
    Nus {
        #[command(subcommand)]
        command: title::nus::Commands,
    },
    /// Pack or unpack a TAD file
    Tad {
        #[command(subcommand)]
        command: title::tad::Commands,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Info { input } => info::info(input)?,
        Commands::Nus { command } => match command {
            title::nus::Commands::Content { tid, cid, version, output, decrypt } => title::nus::download_content(tid, cid, version, output, decrypt)?,
            title::nus::Commands::Ticket { tid, output } => title::nus::download_ticket(tid, output)?,
            title::nus::Commands::Title { tid, version, output } => title::nus::download_title(tid, version, output)?,
            title::nus::Commands::Tmd { tid, version, output } => title::nus::download_tmd(tid, version, output)?,
        },
        Commands::Tad { command } => match command {
            title::tad::Commands::Pack { input, output } => title::tad::pack_tad(input, output)?,
            title::tad::Commands::Unpack { input, output } => title::tad::unpack_tad(input, output)?,
        },
    }
    Ok(())
}
