//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: u8 = 0;

/// General error - unspecified failure
pub const ERROR: u8 = 1;

/// Configuration error - unreadable or invalid files under config/, lock file
pub const CONFIG_ERROR: u8 = 2;

/// Generation error - a deployment chain failed
pub const GENERATE_ERROR: u8 = 3;

/// Drift - generated output differs from the committed deploy/ tree
pub const DRIFT: u8 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: u8 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: u8 = 64;
