//! Core domain types for Toggle.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application: the store keys
//! records by [`SwitchName`], the engine registers [`SwitchConfig`]s, and hosts
//! read [`Representation`]s.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod accessory;
mod name;
mod switch;

pub use accessory::{AccessoryInfo, Representation};
pub use name::{SwitchName, SwitchNameError};
pub use switch::{Characteristic, HostValue, ServiceKind, SwitchConfig};
