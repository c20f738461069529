//! The process exit codes a `brld` run can end with (spec §6 "Exit codes").

/// Mirrors `PROG_EXIT_*`: the small, stable set of codes a supervising
/// process (init script, service manager) can branch on without parsing
/// log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean shutdown, requested or otherwise expected.
    Success = 0,
    /// Bootstrap failed: allocation failure, unrecoverable syscall, or any
    /// other error that leaves no reactor to run.
    Fatal = 1,
    /// Command-line usage error.
    Syntax = 2,
    /// A well-formed command line or config file described something the
    /// daemon cannot act on (e.g. an unknown driver name).
    Semantic = 3,
    /// Repeated termination signals above `TerminationCounter`'s threshold:
    /// the escape hatch that skips the graceful shutdown path entirely.
    Force = 4,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_documented_numbering() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Fatal.code(), 1);
        assert_eq!(ExitCode::Syntax.code(), 2);
        assert_eq!(ExitCode::Semantic.code(), 3);
        assert_eq!(ExitCode::Force.code(), 4);
    }
}
