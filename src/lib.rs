// Core infrastructure modules
pub mod core;

pub mod config;

#[cfg(test)]
pub(crate) mod test_utils;
