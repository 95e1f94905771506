// title/tad.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Code for TAD-related commands in the rustwl CLI.

use std::{str, fs};
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use glob::glob;
use rustwl::title;
use rustwl::title::{commonkeys, content, ticket, tmd};

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
pub enum Commands {
    /// Pack a directory into a TAD file
    Pack {
        /// The directory to pack into a TAD
        input: String,
        /// The name of the packed TAD file
        output: String
    },
    /// Unpack a TAD file into a directory
    Unpack {
        /// The path to the TAD to unpack
        input: String,
        /// The directory to extract the TAD to
        output: String
    }
}

// Finds exactly one file matching the pattern, or bails with the component
// name in the message.
fn find_one(dir: &Path, pattern: &str, what: &str) -> Result<PathBuf> {
    let files: Vec<PathBuf> = glob(&format!("{}/{}", dir.display(), pattern))
        .with_context(|| "failed to read glob pattern")?
        .filter_map(|f| f.ok()).collect();
    if files.is_empty() {
        bail!("No {} file found in the source directory.", what);
    } else if files.len() > 1 {
        bail!("More than one {} file found in the source directory.", what);
    }
    Ok(files[0].clone())
}

pub fn pack_tad(input: &str, output: &str) -> Result<()> {
    let in_path = Path::new(input);
    if !in_path.exists() {
        bail!("Source directory \"{}\" could not be found.", input);
    }
    let store = commonkeys::CommonKeyStore::twl();
    // Read the TMD, Ticket, and cert chain files (only accept one of each.)
    let tmd_file = find_one(in_path, "*.tmd", "TMD")?;
    let tmd = tmd::TMD::from_bytes(&fs::read(&tmd_file)?)
        .with_context(|| format!("The TMD file \"{}\" could not be parsed, and is likely invalid.", tmd_file.display()))?;
    let ticket_file = find_one(in_path, "*.tik", "Ticket")?;
    let tik = ticket::Ticket::from_bytes(&fs::read(&ticket_file)?)
        .with_context(|| format!("The Ticket file \"{}\" could not be parsed, and is likely invalid.", ticket_file.display()))?;
    let cert_file = find_one(in_path, "*.cert", "cert")?;
    let cert_chain = fs::read(&cert_file)?;
    // Read the CRL, if one exists (only accept one file.)
    let crl_files: Vec<PathBuf> = glob(&format!("{}/*.crl", in_path.display()))
        .with_context(|| "failed to read glob pattern")?
        .filter_map(|f| f.ok()).collect();
    let mut crl: Vec<u8> = Vec::new();
    if crl_files.len() == 1 {
        crl = fs::read(&crl_files[0])?;
    }
    // Iterate over the expected contents and load them into the title,
    // re-encrypting them with its Title Key as we go.
    let content_region = content::ContentRegion::new(tmd.content_records.clone());
    let records = tmd.content_records.clone();
    let mut title = title::Title::from_parts(tmd, tik, &cert_chain, &crl, content_region)?;
    for (i, record) in records.iter().enumerate() {
        let content_file = format!("{}/{:08X}.app", in_path.display(), record.index);
        let data = fs::read(&content_file)
            .with_context(|| format!("Required content file \"{}\" could not be read.", content_file))?;
        title.set_content(&data, i, &store)
            .with_context(|| format!("Content file \"{}\" could not be loaded into the title.", content_file))?;
    }
    // Write out the TAD file.
    let mut out_path = PathBuf::from(output);
    if out_path.extension().is_none_or(|ext| ext != "tad") {
        out_path.set_extension("tad");
    }
    fs::write(&out_path, title.to_bytes()?)
        .with_context(|| format!("Could not open TAD file \"{}\" for writing.", out_path.display()))?;
    println!("TAD file packed!");
    Ok(())
}

pub fn unpack_tad(input: &str, output: &str) -> Result<()> {
    let in_path = Path::new(input);
    if !in_path.exists() {
        bail!("Source TAD \"{}\" could not be found.", input);
    }
    let store = commonkeys::CommonKeyStore::twl();
    let (title, warnings) = title::Title::from_bytes(fs::read(in_path)?.as_slice())
        .with_context(|| "The provided TAD file could not be parsed, and is likely invalid.")?;
    for warning in &warnings {
        println!("Warning: {}", warning);
    }
    let tid = hex::encode(title.title_id());
    // Create the output directory if it doesn't exist.
    let out_path = Path::new(output);
    if !out_path.exists() {
        fs::create_dir(out_path)
            .with_context(|| format!("The output directory \"{}\" could not be created.", output))?;
    }
    // Write out all TAD components.
    fs::write(out_path.join(format!("{tid}.tmd")), title.tmd.to_bytes()?)?;
    fs::write(out_path.join(format!("{tid}.tik")), title.ticket.to_bytes()?)?;
    fs::write(out_path.join(format!("{tid}.cert")), title.cert_chain())?;
    if !title.crl().is_empty() {
        fs::write(out_path.join(format!("{tid}.crl")), title.crl())?;
    }
    // Iterate over the contents, decrypt them, and write them out. A hash
    // mismatch is reported but the content is saved anyway.
    for i in 0..title.content.content_records.len() {
        let content_file_name = format!("{:08X}.app", title.content.content_records[i].index);
        let (dec_content, warning) = title.get_content_by_index(i, &store)
            .with_context(|| format!("Content at index {} could not be decrypted.", i))?;
        if let Some(warning) = warning {
            println!("Warning: {}", warning);
        }
        fs::write(out_path.join(content_file_name), dec_content)?;
    }
    println!("TAD file unpacked!");
    Ok(())
}
