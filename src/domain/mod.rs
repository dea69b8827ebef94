//! Core domain types and logic.

pub mod admin;
pub mod config_validation;
pub mod deposit;
pub mod error;
pub mod indicator;
pub mod market;
pub mod portfolio;
pub mod signal;
pub mod trade;
pub mod transaction;
pub mod user;
