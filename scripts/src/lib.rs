//! Scripts for deploying, upgrading, configuring and verifying a manifest of
//! smart contracts, idempotently across runs.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod cli;
pub mod client;
pub mod commands;
pub mod constants;
pub mod errors;
pub mod pipeline;
pub mod placeholder;
mod solidity;
pub mod store;
pub mod types;
pub mod utils;
