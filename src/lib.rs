//! Hybrid semantic/keyword search and AI-assisted prose enhancement for
//! markdown documentation.

pub mod cache;
pub mod config;
pub mod enhancement;
pub mod providers;
pub mod search;

#[cfg(test)]
mod tests;
