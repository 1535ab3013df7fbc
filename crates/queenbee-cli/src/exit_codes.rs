//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Not found - no package, version or digest matched in the index
pub const NOT_FOUND: i32 = 2;

/// Conflict - the package version is already indexed
pub const CONFLICT: i32 = 3;

/// Integrity error - manifest digest differs from the index
pub const INTEGRITY_ERROR: i32 = 4;

/// Package error - bundle is unreadable or has no resource.json
pub const PACKAGE_ERROR: i32 = 5;

/// Unreachable - registry source could not be read
pub const UNREACHABLE: i32 = 6;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 7;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
