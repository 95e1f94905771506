// title/mod.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Root for all title-related commands in the rustwl CLI.

pub mod nus;
pub mod tad;
