//! Library crate for cdn-scan-rs exposing reusable modules.
pub mod candidates;
pub mod engine;
pub mod probes;
pub mod types;
pub mod view;
