//! Route modules for the Muelle server

pub mod files;
pub mod upload;
