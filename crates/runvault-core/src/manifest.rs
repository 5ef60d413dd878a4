//! Environment manifest collection.
//!
//! Records the installed Python package set (`name==version` lines from
//! `pip freeze`) as run metadata. Collection is best effort: a missing
//! interpreter is the caller's cue to log and move on, never to fail the
//! run.

use std::process::Stdio;

use tokio::process::Command;

/// Enumerate installed packages as ordered `name==version` strings.
pub async fn python_env_manifest() -> std::io::Result<Vec<String>> {
    let output = Command::new("python")
        .args(["-m", "pip", "freeze"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("pip freeze exited with {}", output.status),
        ));
    }

    Ok(parse_freeze_output(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_freeze_output(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
