//! Backup routine.
//!
//! Runs the configured rules in order, with global and per-rule hook scripts
//! around them. A failing rule is logged and the routine moves on.

mod error;
mod operation;
mod runner;
mod script;

use std::process::Command;

pub use error::{BackupError, BackupResult};
pub use operation::{
    OperationDispatcher, StepOutcome, archive_extension, archive_file_name, destination_dir,
    latest_archive,
};
pub use runner::{BackupRunner, RoutineSummary, RuleFailure, RuleSelection};
pub use script::ScriptRunner;

/// Run an external program to completion, inheriting stdio.
pub(crate) fn run_command(cmd: &mut Command) -> BackupResult<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    tracing::debug!(
        program = %program,
        args = ?cmd.get_args().collect::<Vec<_>>(),
        "Running external command"
    );

    let status = cmd.status().map_err(|e| BackupError::Spawn { program: program.clone(), source: e })?;

    if !status.success() {
        return Err(BackupError::ToolFailed { program, status: status.to_string() });
    }

    Ok(())
}
