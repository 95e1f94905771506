// lib.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Root level module that imports the feature modules.

pub mod title;
