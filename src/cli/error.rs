// Error handling utilities for consistent error messages and exit codes

use std::process;

/// Exit code for invalid input and refused requests
pub const EXIT_USER_ERROR: i32 = 1;
/// Exit code for unexpected failures (database errors and the like)
pub const EXIT_INTERNAL_ERROR: i32 = 2;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, refused requests, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(EXIT_USER_ERROR);
}

/// Print a warning about one item of a multi-item request
pub fn warn_item(message: &str) {
    eprintln!("Warning: {}", message);
}

/// Whether an error reaching the top level was caused by the user
/// (bad configuration or a malformed request) rather than the system
pub fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.is::<crate::admin::AdminError>() || cause.is::<crate::config::ConfigError>()
    })
}
