// info.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Code for the info command in the rustwl CLI.

use std::{str, fs};
use std::path::Path;
use anyhow::{bail, Context, Result};
use rustwl::title;
use rustwl::title::{commonkeys, tad, ticket, tmd};
use crate::filetypes::{TWLFileType, identify_file_type};

fn tid_to_ascii(tid: [u8; 8]) -> Option<String> {
    let tid = String::from_utf8_lossy(&tid[4..]).trim_end_matches('\0').trim_start_matches('\0').to_owned();
    if tid.len() == 4 {
        Some(tid)
    } else {
        None
    }
}

fn print_tmd_info(tmd: tmd::TMD) {
    // Print all important keys from the TMD.
    println!("Title Info");
    let ascii_tid = tid_to_ascii(tmd.title_id);
    if let Some(ascii_tid) = ascii_tid {
        println!("  Title ID: {} ({})", hex::encode(tmd.title_id).to_uppercase(), ascii_tid);
    } else {
        println!("  Title ID: {}", hex::encode(tmd.title_id).to_uppercase());
    }
    println!("  Title Version: {}", tmd.title_version);
    println!("  TMD Version: {}", tmd.tmd_version);
    let signature_issuer = String::from_utf8(Vec::from(tmd.signature_issuer)).unwrap_or_default();
    if signature_issuer.contains("CP00000004") {
        println!("  Certificate: CP00000004 (Retail)");
        println!("  Certificate Issuer: Root-CA00000001 (Retail)");
    } else if signature_issuer.contains("CP00000007") {
        println!("  Certificate: CP00000007 (Development)");
        println!("  Certificate Issuer: Root-CA00000002 (Development)");
    } else {
        println!("  Certificate Info: {} (Unknown)", signature_issuer.trim_end_matches('\0'));
    }
    println!("\nContent Info");
    println!("  Total Contents: {}", tmd.content_records.len());
    println!("  Boot Content Index: {}", tmd.boot_index);
    println!("  Content Records:");
    for content in tmd.content_records {
        println!("    Content Index: {}", content.index);
        println!("      Content ID: {:08X}", content.content_id);
        println!("      Content Type: {}", content.content_type);
        println!("      Content Size: {} bytes", content.content_size);
        println!("      Content Hash: {}", hex::encode(content.content_hash));
    }
}

fn print_ticket_info(ticket: ticket::Ticket) {
    // Print all important keys from the Ticket.
    println!("Ticket Info");
    let ascii_tid = tid_to_ascii(ticket.title_id);
    if let Some(ascii_tid) = ascii_tid {
        println!("  Title ID: {} ({})", hex::encode(ticket.title_id).to_uppercase(), ascii_tid);
    } else {
        println!("  Title ID: {}", hex::encode(ticket.title_id).to_uppercase());
    }
    println!("  Title Version: {}", ticket.title_version);
    println!("  Ticket Version: {}", ticket.ticket_version);
    let key = match ticket.common_key_index {
        0 => "Common (Production)",
        1 => "Common (Development)",
        2 => "Common (Debugger)",
        _ => "Unknown"
    };
    println!("  Decryption Key: {}", key);
    println!("  Title Key (Encrypted): {}", hex::encode(ticket.title_key));
    match ticket.dec_title_key(&commonkeys::CommonKeyStore::twl()) {
        Ok(title_key) => println!("  Title Key (Decrypted): {}", hex::encode(title_key)),
        Err(_) => println!("  Title Key (Decrypted): <no common key for index {}>", ticket.common_key_index),
    }
}

fn print_tad_info(data: &[u8]) -> Result<()> {
    let (tad, mut warnings) = tad::TAD::from_bytes(data).with_context(|| "The provided TAD file could not be parsed, and is likely invalid.")?;
    println!("TAD Info");
    println!("  Has Cert Chain: {}", tad.cert_chain_size() != 0);
    println!("  Has CRL: {}", tad.crl_size() != 0);
    let (title, title_warnings) = title::Title::from_tad(&tad)?;
    warnings.extend(title_warnings);
    for warning in &warnings {
        println!("  Warning: {}", warning);
    }
    println!();
    print_ticket_info(title.ticket);
    println!();
    print_tmd_info(title.tmd);
    Ok(())
}

pub fn info(input: &str) -> Result<()> {
    let in_path = Path::new(input);
    if !in_path.exists() {
        bail!("Input file \"{}\" could not be found.", input);
    }
    match identify_file_type(input) {
        Some(TWLFileType::Tmd) => {
            let tmd = tmd::TMD::from_bytes(fs::read(in_path)?.as_slice()).with_context(|| "The provided TMD file could not be parsed, and is likely invalid.")?;
            print_tmd_info(tmd);
        },
        Some(TWLFileType::Ticket) => {
            let ticket = ticket::Ticket::from_bytes(fs::read(in_path)?.as_slice()).with_context(|| "The provided Ticket file could not be parsed, and is likely invalid.")?;
            print_ticket_info(ticket);
        },
        Some(TWLFileType::Tad) => {
            print_tad_info(fs::read(in_path)?.as_slice())?;
        },
        None => {
            bail!("Information cannot be displayed for this file.");
        }
    }
    Ok(())
}
