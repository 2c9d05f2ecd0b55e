// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod import;

#[cfg(test)]
pub mod test_utils;
