//! Stylus Studio core: the client side of a browser IDE for Stylus smart
//! contracts.
//!
//! * [`editor`] keeps the editor widget and the parent-owned source text in
//!   sync, with debounced autosave and view-state restoration.
//! * [`compiler`] talks to the remote compile/deploy service.
//! * [`ledger`] and [`abi`] verify, call and transact against the chain.
//! * [`backend`] and [`auth`] persist accounts, projects and history.
//! * [`studio`] wires them into the IDE workflows.

pub mod abi;
pub mod api;
pub mod auth;
pub mod backend;
pub mod compiler;
pub mod config;
pub mod console;
pub mod db;
pub mod editor;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod realtime;
pub mod rpc;
pub mod studio;
pub mod templates;

pub use config::Config;
pub use errors::{Result, StudioError};
pub use studio::Studio;

#[cfg(test)]
mod test_editor_sync;
#[cfg(test)]
mod test_studio;
