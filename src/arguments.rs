/// Centralized argument handling
///
/// Stores the process arguments for access throughout the application and
/// separates logging flags (`--debug-<tag>`, `--verbose`, `--verbose-<tag>`,
/// `--quiet`) from the arguments handed to the clap command parser.
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::env;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    CMD_ARGS.lock().clone()
}

/// Whether an argument is consumed by the logger rather than the command parser
pub fn is_logging_flag(arg: &str) -> bool {
    arg == "--verbose" || arg == "--quiet" || arg.starts_with("--debug-") || arg.starts_with("--verbose-")
}

/// Split arguments into (logging flags, remaining arguments)
pub fn split_logging_flags(args: &[String]) -> (Vec<String>, Vec<String>) {
    args.iter().cloned().partition(|arg| is_logging_flag(arg))
}

/// Arguments with logging flags removed, ready for the command parser
pub fn command_args() -> Vec<String> {
    split_logging_flags(&get_cmd_args()).1
}
