//! Wire protocol, configuration and platform paths shared between the
//! keywheel service and its UI peer.

pub mod config;
pub mod platform;
pub mod protocol;
