//! Core library for the arb-scanner project.
//!
//! Pulls spot tickers from several centralized exchanges into a TTL
//! cache and evaluates cross-exchange arbitrage opportunities over it.
//! The binary (`main.rs`) only wires configuration, clients and the
//! periodic scan loop.

pub mod arbitrage;
pub mod cache;
pub mod config;
pub mod errors;
pub mod exchange;
pub mod models;
pub mod orchestrator;
pub mod service;
pub mod utils;
