use crate::history::ExecutionRecord;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};

/// Placeholder replaced with the triggering file's absolute path.
pub const FILE_TOKEN: &str = "$FILE";

pub const DEFAULT_SHELL: &str = "/bin/sh";

pub fn expand(template: &str, file: &Path) -> String {
    template.replace(FILE_TOKEN, &file.to_string_lossy())
}

/// Run `template` through `shell -c` for `file`.
///
/// Never fails: a shell that cannot be launched yields an unsuccessful
/// record carrying the launch error as its output. There is no timeout, so a
/// command that hangs holds its file's guard until it exits.
pub fn run(shell: &str, template: &str, file: &Path) -> ExecutionRecord {
    let command = expand(template, file);
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string_lossy().into_owned());

    let (output, success) = match spawn_and_collect(shell, &command) {
        Ok(result) => result,
        Err(e) => (format!("Failed to launch {shell}: {e}"), false),
    };
    ExecutionRecord::new(template, &name, output, success)
}

/// stdout and stderr share one pipe so the output keeps its interleaving.
fn spawn_and_collect(shell: &str, command: &str) -> io::Result<(String, bool)> {
    let (mut reader, writer) = io::pipe()?;
    let mut child = {
        // The Command holds the parent's copies of the write end; it must be
        // dropped before reading or the read never sees EOF.
        let mut cmd = Command::new(shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);
        cmd.spawn()?
    };

    let mut bytes = Vec::new();
    let read = reader.read_to_end(&mut bytes);
    let status = child.wait()?;
    read?;
    Ok((String::from_utf8_lossy(&bytes).into_owned(), status.success()))
}
