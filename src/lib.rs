//! ircserv, a small single-threaded IRC server.
//!
//! # Usage
//!
//! ```console
//! ircserv <port> <password>
//! ircserv --config ircserv.conf
//! ```
//!
//! An empty password lets clients register without a PASS command.  The configuration file uses
//! the scfg format, see `config` for the list of directives.
//!
//! During development: `cargo run -- 6667 hunter2`

#![forbid(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]
#![allow(clippy::shadow_unrelated, clippy::use_self)]

pub use crate::config::Config;
pub use crate::state::State;

#[macro_use]
mod lines;

pub mod channel;
pub mod client;
pub mod config;
pub mod modes;
pub mod net;
mod state;
mod util;
