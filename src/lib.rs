pub mod aggregate;
pub mod analyst;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod format;
pub mod process;
