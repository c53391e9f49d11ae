pub mod cli;
pub mod commands;
pub mod config;
pub mod contracts;
pub mod crypto;
pub mod display;
pub mod lifecycle;
pub mod receipt;
pub mod rpc;
pub mod store;
pub mod tx_builder;
