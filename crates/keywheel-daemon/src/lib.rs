pub mod catalog;
pub mod filter;
pub mod host;
pub mod ipc;
pub mod keys;
pub mod playing;
pub mod selection;
pub mod service;
pub mod track;

pub use service::{BrowserError, BrowserService};
