#![deny(clippy::all)]

pub mod domain;
pub mod events;
pub mod location;
pub mod ports;
pub mod stock;
