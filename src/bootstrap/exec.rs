//! Hand the process over to the caller's command.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Replace the current process with `argv`.
///
/// Only returns on failure, with the error that prevented the exec.
pub fn exec_command(argv: &[String]) -> io::Error {
    let Some((program, args)) = argv.split_first() else {
        return io::Error::new(io::ErrorKind::InvalidInput, "no command to exec");
    };

    tracing::debug!("Exec {} {}", program, args.join(" "));
    Command::new(program).args(args).exec()
}
