//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors, or there was nothing to do
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - the desired state is invalid
pub const VALIDATION_ERROR: i32 = 2;

/// Load error - the state file could not be read, substituted or parsed
pub const LOAD_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Cluster error - context setup, namespace reconciliation or discovery failed
pub const CLUSTER_ERROR: i32 = 6;
