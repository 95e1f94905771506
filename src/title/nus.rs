// title/nus.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Implements the functions required for downloading data from the NUS.

use thiserror::Error;
use crate::title::{content, ticket, tmd, Title, TitleError};

const NUS_ENDPOINT: &str = "http://nus.cdn.t.shop.nintendowifi.net/ccs/download/";
// The NUS refuses requests that don't come from something that looks like the
// DS browser.
const USER_AGENT: &str = "Opera/9.50 (Nintendo; Opera/154; U; Nintendo DS; en)";

#[derive(Debug, Error)]
pub enum NUSError {
    #[error("the requested Title ID `{0}`, or the requested version of it, is not available on the NUS")]
    TitleNotFound(String),
    #[error("no Ticket is available for Title ID `{0}`, it may not be a free title")]
    TicketNotFound(String),
    #[error("content with Content ID {0:08X} could not be downloaded")]
    ContentNotFound(u32),
    #[error("the NUS returned a malformed response for Title ID `{0}`")]
    MalformedResponse(String),
    #[error("the downloaded data could not be assembled into a title")]
    Title(#[from] Box<TitleError>),
    #[error("an error occurred while downloading from the NUS")]
    Request(#[from] reqwest::Error),
}

fn make_request(url: &str) -> Result<Option<Vec<u8>>, NUSError> {
    let client = reqwest::blocking::Client::new();
    let response = client.get(url).header(reqwest::header::USER_AGENT, USER_AGENT).send()?;
    if !response.status().is_success() {
        return Ok(None);
    }
    Ok(Some(response.bytes()?.to_vec()))
}

/// Downloads the TMD for the specified Title ID from the NUS. Downloads the
/// latest version unless a specific one is requested.
pub fn download_tmd(title_id: [u8; 8], title_version: Option<u16>) -> Result<Vec<u8>, NUSError> {
    // The URL is download/<TID>/tmd for the latest version and
    // download/<TID>/tmd.<version> when a specific version is requested.
    let mut url = format!("{}{}/tmd", NUS_ENDPOINT, hex::encode(title_id));
    if let Some(version) = title_version {
        url = format!("{url}.{version}");
    }
    make_request(&url)?.ok_or(NUSError::TitleNotFound(hex::encode(title_id)))
}

/// Downloads the Ticket for the specified Title ID from the NUS. This only
/// works for titles that are freely available.
pub fn download_ticket(title_id: [u8; 8]) -> Result<Vec<u8>, NUSError> {
    let url = format!("{}{}/cetk", NUS_ENDPOINT, hex::encode(title_id));
    let cetk = make_request(&url)?.ok_or(NUSError::TicketNotFound(hex::encode(title_id)))?;
    // A cetk file is a Ticket followed by certificates we don't need here, so
    // load and re-dump it to keep just the Ticket itself.
    let ticket = ticket::Ticket::from_bytes(&cetk).map_err(|x| Box::new(TitleError::Ticket(x)))?;
    Ok(ticket.to_bytes().map_err(|x| Box::new(TitleError::IO(x)))?)
}

/// Downloads the content with the specified Content ID belonging to the
/// specified Title ID from the NUS. The result is still encrypted.
pub fn download_content(title_id: [u8; 8], content_id: u32) -> Result<Vec<u8>, NUSError> {
    let url = format!("{}{}/{:08x}", NUS_ENDPOINT, hex::encode(title_id), content_id);
    make_request(&url)?.ok_or(NUSError::ContentNotFound(content_id))
}

// Splices the CA, CP, and XS certs out of a downloaded TMD and cetk. The
// buffers come straight off the network, so their lengths are checked before
// any slicing happens.
fn assemble_cert_chain(tmd: &[u8], cetk: &[u8]) -> Result<Vec<u8>, NUSError> {
    if cetk.len() < 0x2A4 + 768 || tmd.len() < 0x208 + 768 {
        return Err(NUSError::MalformedResponse(String::from("00030017484e4145")));
    }
    let mut cert_chain = Vec::new();
    cert_chain.extend_from_slice(&cetk[0x1A4 + 1024..]);
    cert_chain.extend_from_slice(&tmd[0x208..0x208 + 768]);
    cert_chain.extend_from_slice(&cetk[0x2A4..0x2A4 + 768]);
    Ok(cert_chain)
}

/// Downloads the certificate chain used by all retail TADs. The chain is
/// assembled from the signing data of the System Launcher's TMD and cetk,
/// since the NUS doesn't serve it directly.
pub fn download_cert_chain() -> Result<Vec<u8>, NUSError> {
    // Download the TMD and cetk for System Launcher 1.4.5U.
    let tmd_url = format!("{NUS_ENDPOINT}00030017484e4145/tmd.1792");
    let cetk_url = format!("{NUS_ENDPOINT}00030017484e4145/cetk");
    let tmd = make_request(&tmd_url)?.ok_or(NUSError::TitleNotFound(String::from("00030017484e4145")))?;
    let cetk = make_request(&cetk_url)?.ok_or(NUSError::TicketNotFound(String::from("00030017484e4145")))?;
    // The chain is the CA cert from the cetk, the CP cert from the TMD, and
    // the XS cert from the cetk.
    assemble_cert_chain(&tmd, &cetk)
}

/// Downloads an entire title from the NUS: its TMD, Ticket, certificate
/// chain, and every content its TMD lists, assembled into a Title object.
/// The contents are left encrypted; decryption happens lazily on access.
pub fn download_title(title_id: [u8; 8], title_version: Option<u16>) -> Result<Title, NUSError> {
    let tmd = tmd::TMD::from_bytes(&download_tmd(title_id, title_version)?)
        .map_err(|x| Box::new(TitleError::TMD(x)))?;
    let ticket = ticket::Ticket::from_bytes(&download_ticket(title_id)?)
        .map_err(|x| Box::new(TitleError::Ticket(x)))?;
    let cert_chain = download_cert_chain()?;
    let mut region = content::ContentRegion::new(tmd.content_records.clone());
    for (i, record) in tmd.content_records.iter().enumerate() {
        let content = download_content(title_id, record.content_id)?;
        region.load_enc_content(&content, i).map_err(|x| Box::new(TitleError::Content(x)))?;
    }
    let title = Title::from_parts(tmd, ticket, &cert_chain, &[], region).map_err(Box::new)?;
    Ok(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cert_chain_assembly() {
        let tmd = vec![0xAA; 0x208 + 768];
        let cetk = vec![0xBB; 0x1A4 + 1024 + 10];
        let chain = assemble_cert_chain(&tmd, &cetk).unwrap();
        assert_eq!(chain.len(), 10 + 768 + 768);
    }

    #[test]
    fn test_short_responses_are_rejected() {
        // A short 200 response must become an error, not a panic.
        let ok = vec![0u8; 0x1000];
        assert!(matches!(assemble_cert_chain(&[0u8; 0x100], &ok), Err(NUSError::MalformedResponse(_))));
        assert!(matches!(assemble_cert_chain(&ok, &[0u8; 0x100]), Err(NUSError::MalformedResponse(_))));
    }
}
