// filetypes.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Common code for identifying DSi file types.

use std::{str, fs::File};
use std::io::Read;
use std::path::Path;
use regex::RegexBuilder;

#[derive(Debug)]
#[derive(PartialEq)]
pub enum TWLFileType {
    Tad,
    Tmd,
    Ticket
}

pub fn identify_file_type(input: &str) -> Option<TWLFileType> {
    let input = Path::new(input);
    let re = RegexBuilder::new(r"tmd\.?[0-9]*").case_insensitive(true).build().unwrap();
    // == TMD ==
    if re.is_match(input.to_str()?) ||
        input.file_name().is_some_and(|f| f.eq_ignore_ascii_case("tmd.bin")) ||
        input.extension().is_some_and(|f| f.eq_ignore_ascii_case("tmd")) {
        return Some(TWLFileType::Tmd);
    }
    // == Ticket ==
    if input.extension().is_some_and(|f| f.eq_ignore_ascii_case("tik")) ||
        input.file_name().is_some_and(|f| f.eq_ignore_ascii_case("ticket.bin")) ||
        input.file_name().is_some_and(|f| f.eq_ignore_ascii_case("cetk")) {
        return Some(TWLFileType::Ticket);
    }
    // == TAD ==
    if input.extension().is_some_and(|f| f.eq_ignore_ascii_case("tad")) {
        return Some(TWLFileType::Tad);
    }
    // Advanced TAD detection, where we read and compare the first 6 bytes (only if the path exists.)
    if let Ok(mut f) = File::open(input) {
        let mut magic_number = [0u8; 6];
        // Files too short to hold the magic number can't be TADs.
        if f.read_exact(&mut magic_number).is_ok() && magic_number == *b"\x00\x00\x00\x20\x49\x73" {
            return Some(TWLFileType::Tad);
        }
    }

    // == No match found! ==
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_tmd() {
        assert_eq!(identify_file_type("tmd"), Some(TWLFileType::Tmd));
        assert_eq!(identify_file_type("TMD"), Some(TWLFileType::Tmd));
        assert_eq!(identify_file_type("tmd.bin"), Some(TWLFileType::Tmd));
        assert_eq!(identify_file_type("tmd.1792"), Some(TWLFileType::Tmd));
        assert_eq!(identify_file_type("00030015484e4c41.tmd"), Some(TWLFileType::Tmd));
    }

    #[test]
    fn test_parse_tik() {
        assert_eq!(identify_file_type("ticket.bin"), Some(TWLFileType::Ticket));
        assert_eq!(identify_file_type("cetk"), Some(TWLFileType::Ticket));
        assert_eq!(identify_file_type("00030015484e4c41.tik"), Some(TWLFileType::Ticket));
    }

    #[test]
    fn test_parse_tad() {
        assert_eq!(identify_file_type("00030015484e4c41.tad"), Some(TWLFileType::Tad));
        assert_eq!(identify_file_type("00030015484e4c41.TAD"), Some(TWLFileType::Tad));
    }

    #[test]
    fn test_parse_no_match() {
        assert_eq!(identify_file_type("somefile.txt"), None);
    }

    #[test]
    fn test_short_file_no_match() {
        let path = std::env::temp_dir().join("rustwl-short-file");
        std::fs::write(&path, b"\x00\x00").unwrap();
        assert_eq!(identify_file_type(path.to_str().unwrap()), None);
        std::fs::remove_file(&path).unwrap();
    }
}
