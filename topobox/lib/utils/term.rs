//! Terminal utilities.

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Determines if the process is running in an interactive terminal environment
pub fn is_interactive_terminal() -> bool {
    // Safety: isatty only inspects the file descriptor.
    let stdin_is_tty = unsafe { libc::isatty(libc::STDIN_FILENO) == 1 };
    let stdout_is_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 };

    stdin_is_tty && stdout_is_tty
}

/// Determines if the terminal is interactive and understands ANSI escape codes.
pub fn is_ansi_interactive_terminal() -> bool {
    is_interactive_terminal() && std::env::var("TERM").map_or(true, |term| term != "dumb")
}
