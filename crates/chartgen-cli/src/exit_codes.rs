//! Process exit codes

/// Manifests written to stdout
pub const SUCCESS: i32 = 0;

/// Wrong number of arguments or an invalid option
pub const USAGE_ERROR: i32 = 1;

/// Any stage of generation failed; nothing was written to stdout
pub const GENERATE_ERROR: i32 = 2;
