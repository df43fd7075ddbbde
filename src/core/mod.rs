//! Core library components.
//!
//! The vault engine, identity context, injection proxy, audit log and sync
//! engine. Nothing in here prints or reads from a terminal.

pub mod audit;
pub mod config;
pub mod constants;
pub mod context;
pub mod crypto;
pub mod domain;
pub mod keyswitch;
pub mod runner;
pub mod store;
pub mod sync;
pub mod types;
pub mod validation;
pub mod vault;
