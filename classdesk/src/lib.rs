//! ClassDesk library
//!
//! Data layer and services of ClassDesk: class rosters, attendance and
//! reports on a remote document store; notes, lesson plans and settings
//! in local key-value storage. The `classdesk` binary is a thin command
//! line front end over this crate.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;
