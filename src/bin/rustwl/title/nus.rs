// title/nus.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Code for NUS-related commands in the rustwl CLI.

use std::{str, fs};
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use clap::{Subcommand, Args};
use sha1::{Sha1, Digest};
use rustwl::title;
use rustwl::title::{commonkeys, crypto, nus, ticket, tmd};

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
pub enum Commands {
    /// Download specific content from the NUS
    Content {
        /// The Title ID that the content belongs to
        tid: String,
        /// The Content ID of the content (in hex format, like 000000xx)
        cid: String,
        /// The title version that the content belongs to (only required for decryption)
        #[arg(short, long)]
        version: Option<u16>,
        /// An optional content file name; defaults to <cid>(.app)
        #[arg(short, long)]
        output: Option<String>,
        /// Decrypt the content
        #[arg(short, long)]
        decrypt: bool,
    },
    /// Download a Ticket from the NUS
    Ticket {
        /// The Title ID that the Ticket is for
        tid: String,
        /// An optional Ticket name; defaults to <tid>.tik
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Download a title from the NUS
    Title {
        /// The Title ID of the Title to download
        tid: String,
        /// The version of the Title to download
        #[arg(short, long)]
        version: Option<u16>,
        #[command(flatten)]
        output: TitleOutputType,
    },
    /// Download a TMD from the NUS
    Tmd {
        /// The Title ID that the TMD is for
        tid: String,
        /// The version of the TMD to download
        #[arg(short, long)]
        version: Option<u16>,
        /// An optional TMD name; defaults to <tid>.tmd
        #[arg(short, long)]
        output: Option<String>,
    }
}

#[derive(Args)]
#[clap(next_help_heading = "Output Format")]
#[group(multiple = false, required = true)]
pub struct TitleOutputType {
    /// Download the Title data to the specified output directory
    #[arg(short, long)]
    output: Option<String>,
    /// Download the Title to a TAD file
    #[arg(short, long)]
    tad: Option<String>,
}

fn parse_tid(tid: &str) -> Result<[u8; 8]> {
    if tid.len() != 16 {
        bail!("The specified Title ID is invalid!");
    }
    Ok(hex::decode(tid).with_context(|| "The specified Title ID is invalid!")?.try_into().unwrap())
}

pub fn download_content(tid: &str, cid: &str, version: &Option<u16>, output: &Option<String>, decrypt: &bool) -> Result<()> {
    println!("Downloading content with Content ID {cid}...");
    let cid = u32::from_str_radix(cid, 16).with_context(|| "The specified Content ID is invalid!")?;
    let tid = parse_tid(tid)?;
    let content = nus::download_content(tid, cid).with_context(|| "Content data could not be downloaded.")?;
    let out_path = if output.is_some() {
        PathBuf::from(output.clone().unwrap())
    } else if *decrypt {
        PathBuf::from(format!("{cid:08X}.app"))
    } else {
        PathBuf::from(format!("{cid:08X}"))
    };
    if *decrypt {
        // We need the TMD for the content's record, because the content's
        // index is the IV for decryption, and a Ticket for the Title Key.
        let version: u16 = if version.is_some() {
            version.unwrap()
        } else {
            bail!("You must specify the title version that the requested content belongs to for decryption!");
        };
        println!(" - Downloading TMD...");
        let tmd = match nus::download_tmd(tid, Some(version)) {
            Ok(tmd) => tmd::TMD::from_bytes(&tmd)?,
            Err(_) => bail!("No TMD could be found for the specified version! Check the version and try again.")
        };
        println!(" - Downloading Ticket...");
        let tik = match nus::download_ticket(tid) {
            Ok(tik) => ticket::Ticket::from_bytes(&tik)?,
            Err(_) => bail!("No Ticket is available for this title! The content cannot be decrypted.")
        };
        println!(" - Decrypting content...");
        let (content_hash, content_size, content_index) = tmd.content_records().iter()
            .find(|record| record.content_id == cid)
            .map(|record| (record.content_hash, record.content_size, record.index))
            .with_context(|| "No matching content record could be found. Please make sure the requested content is from the specified title version.")?;
        let title_key = tik.dec_title_key(&commonkeys::CommonKeyStore::twl())?;
        let mut content_dec = crypto::decrypt_content(&content, title_key, content_index);
        content_dec.truncate(content_size as usize);
        // Verify the content's hash before saving it.
        let mut hasher = Sha1::new();
        hasher.update(&content_dec);
        let result = hasher.finalize();
        if result[..] != content_hash {
            bail!("The content's hash did not match the expected value. (Hash was {}, but the expected hash is {}.)",
                hex::encode(result), hex::encode(content_hash));
        }
        fs::write(&out_path, content_dec).with_context(|| format!("Failed to open content file \"{}\" for writing.", out_path.display()))?;
    } else {
        // If we're not decrypting, just write the file out and call it a day.
        fs::write(&out_path, content).with_context(|| format!("Failed to open content file \"{}\" for writing.", out_path.display()))?
    }
    println!("Successfully downloaded content with Content ID {:08X} to file \"{}\"!", cid, out_path.display());
    Ok(())
}

pub fn download_ticket(tid: &str, output: &Option<String>) -> Result<()> {
    println!("Downloading Ticket for title {tid}...");
    let out_path = if output.is_some() {
        PathBuf::from(output.clone().unwrap())
    } else {
        PathBuf::from(format!("{tid}.tik"))
    };
    let tid = parse_tid(tid)?;
    let tik_data = nus::download_ticket(tid).with_context(|| "Ticket data could not be downloaded.")?;
    fs::write(&out_path, tik_data)?;
    println!("Successfully downloaded Ticket to \"{}\"!", out_path.display());
    Ok(())
}

fn download_title_dir(title: title::Title, output: String) -> Result<()> {
    println!(" - Saving downloaded data...");
    let out_path = PathBuf::from(output);
    if out_path.exists() {
        if !out_path.is_dir() {
            bail!("A file already exists with the specified directory name!");
        }
    } else {
        fs::create_dir(&out_path).with_context(|| format!("The output directory \"{}\" could not be created.", out_path.display()))?;
    }
    let store = commonkeys::CommonKeyStore::twl();
    let tid = hex::encode(title.title_id());
    println!("  - Saving TMD...");
    fs::write(out_path.join(format!("{}.tmd", &tid)), title.tmd.to_bytes()?).with_context(|| format!("Failed to open TMD file \"{tid}.tmd\" for writing."))?;
    println!("  - Saving Ticket...");
    fs::write(out_path.join(format!("{}.tik", &tid)), title.ticket.to_bytes()?).with_context(|| format!("Failed to open Ticket file \"{tid}.tik\" for writing."))?;
    println!("  - Saving certificate chain...");
    fs::write(out_path.join(format!("{}.cert", &tid)), title.cert_chain()).with_context(|| format!("Failed to open certificate chain file \"{tid}.cert\" for writing."))?;
    // Iterate over the content files and write them out in decrypted form.
    for (i, record) in title.content.content_records.clone().iter().enumerate() {
        println!("  - Decrypting and saving content with Content ID {:08X}...", record.content_id);
        let (dec_content, warning) = title.get_content_by_index(i, &store)?;
        if let Some(warning) = warning {
            println!("    - Warning: {}", warning);
        }
        fs::write(out_path.join(format!("{:08X}.app", record.index)), dec_content)
            .with_context(|| format!("Failed to open content file \"{:08X}.app\" for writing.", record.index))?;
    }
    println!("Successfully downloaded title with Title ID {} to directory \"{}\"!", tid, out_path.display());
    Ok(())
}

fn download_title_tad(title: title::Title, output: String) -> Result<()> {
    println!(" - Packing TAD...");
    let out_path = PathBuf::from(output).with_extension("tad");
    fs::write(&out_path, title.to_bytes().with_context(|| "A TAD could not be packed.")?).with_context(|| format!("Could not open TAD file \"{}\" for writing.", out_path.display()))?;
    println!("Successfully downloaded title with Title ID {} to TAD file \"{}\"!", hex::encode(title.title_id()), out_path.display());
    Ok(())
}

pub fn download_title(tid: &str, version: &Option<u16>, output: &TitleOutputType) -> Result<()> {
    if version.is_some() {
        println!("Downloading title {} v{}, please wait...", tid, version.unwrap());
    } else {
        println!("Downloading title {tid} vLatest, please wait...");
    }
    let tid = parse_tid(tid)?;
    let title = nus::download_title(tid, *version).with_context(|| "The title could not be downloaded.")?;
    if output.tad.is_some() {
        download_title_tad(title, output.tad.clone().unwrap())?;
    } else {
        download_title_dir(title, output.output.clone().unwrap())?;
    }
    Ok(())
}

pub fn download_tmd(tid: &str, version: &Option<u16>, output: &Option<String>) -> Result<()> {
    println!("Downloading TMD for title {tid}...");
    let out_path = if output.is_some() {
        PathBuf::from(output.clone().unwrap())
    } else if version.is_some() {
        PathBuf::from(format!("{}.tmd.{}", tid, version.unwrap()))
    } else {
        PathBuf::from(format!("{tid}.tmd"))
    };
    let tid = parse_tid(tid)?;
    let tmd_data = nus::download_tmd(tid, *version).with_context(|| "TMD data could not be downloaded.")?;
    fs::write(&out_path, tmd_data)?;
    println!("Successfully downloaded TMD to \"{}\"!", out_path.display());
    Ok(())
}
