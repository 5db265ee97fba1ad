//! Wallet Agent - request arbitration and authentication gating for a wallet
//! status-bar agent.
//!
//! This library provides:
//! - Session links and browser-extension requests as typed external requests
//! - A single-flight biometric/password authentication gate
//! - The agent that routes each request to exactly one flow and reports every
//!   outcome back to its origin exactly once

pub mod action;
pub mod agent;
pub mod config;
pub mod domain;
pub mod gate;
pub mod infra;
pub mod surface;
