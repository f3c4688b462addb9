//! Find a running process by name, for resolving addresses it captured.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A process found under `/proc`
#[derive(Debug)]
pub struct ProcessInfo {
    pub pid: i32,
    pub exe_path: PathBuf,
    pub command: String,
}

/// Find the single process whose command or executable matches `name`.
///
/// # Errors
/// - `/proc` cannot be listed
/// - No process matches
/// - More than one process matches (ambiguous)
pub fn find_process(name: &str) -> Result<ProcessInfo> {
    let mut matches: Vec<ProcessInfo> = fs::read_dir("/proc")
        .context("Failed to read /proc")?
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
        .filter_map(read_process)
        .filter(|process| is_match(&process.command, &process.exe_path, name))
        .collect();

    match matches.len() {
        0 => bail!("No process matching '{name}' found"),
        1 => Ok(matches.remove(0)),
        _ => {
            let list: Vec<String> =
                matches.iter().map(|m| format!("  {} ({})", m.pid, m.command)).collect();
            bail!(
                "Multiple processes match '{name}':\n{}\n\n\
                 Specify the PID explicitly: objaddr --pid <PID> ...",
                list.join("\n")
            )
        }
    }
}

/// Command and executable of `pid`, or `None` for kernel threads and
/// processes we may not inspect
fn read_process(pid: i32) -> Option<ProcessInfo> {
    let exe_path = fs::read_link(format!("/proc/{pid}/exe")).ok()?;
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let command = extract_comm(&stat)?.to_string();
    Some(ProcessInfo { pid, exe_path, command })
}

/// Command name from a `/proc/<pid>/stat` line: `pid (comm) state ...`
///
/// The command may itself contain parentheses, so the last `)` closes it.
fn extract_comm(stat_line: &str) -> Option<&str> {
    let open = stat_line.find('(')?;
    let close = stat_line.rfind(')')?;
    (open < close).then(|| &stat_line[open + 1..close])
}

fn is_match(command: &str, exe_path: &Path, pattern: &str) -> bool {
    let exe_name = exe_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let pattern_name = Path::new(pattern).file_name().and_then(|n| n.to_str()).unwrap_or(pattern);

    command == pattern_name || exe_name == pattern_name || exe_path == Path::new(pattern)
}
