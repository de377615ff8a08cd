//! External process execution
//!
//! Every invocation is an argument vector handed straight to the program; no
//! shell is involved, so schema names and paths are never re-parsed.

use crate::artifacts::temp_file_beside;
use crate::error::RedefinerError;
use anyhow::{anyhow, Result};
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Render a command as `program arg1 arg2 ...` for logs and error messages
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

fn check(cmd: &Command, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(RedefinerError::CommandFailed {
        program: describe(cmd),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
    .into())
}

fn spawn_error(cmd: &Command, e: std::io::Error) -> anyhow::Error {
    anyhow!("Failed to execute `{}`: {}", describe(cmd), e)
}

/// Run to completion and return stdout as text
pub fn capture_stdout(cmd: &mut Command) -> Result<String> {
    debug!("running {}", describe(cmd));
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(cmd, e))?;
    check(cmd, &output)?;
    String::from_utf8(output.stdout)
        .map_err(|e| anyhow!("`{}` produced non UTF-8 output: {}", describe(cmd), e))
}

/// Run to completion with stdout streamed into `dest`
///
/// Output lands in a temporary file next to `dest` and is renamed over it only
/// when the program succeeds.
pub fn stdout_to_file(cmd: &mut Command, dest: &Path) -> Result<()> {
    debug!("running {} > {}", describe(cmd), dest.display());
    let tmp = temp_file_beside(dest)?;
    let sink = tmp
        .reopen()
        .map_err(|e| anyhow!("Unable to open temporary file for {}: {}", dest.display(), e))?;

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(sink))
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(cmd, e))?;
    check(cmd, &output)?;

    tmp.persist(dest)
        .map_err(|e| anyhow!("Unable to write {}: {}", dest.display(), e.error))?;
    Ok(())
}

/// Run to completion with `source` fed to stdin
pub fn stdin_from_file(cmd: &mut Command, source: &Path) -> Result<()> {
    debug!("running {} < {}", describe(cmd), source.display());
    let input = File::open(source)
        .map_err(|e| anyhow!("Unable to open {}: {}", source.display(), e))?;

    let output = cmd
        .stdin(Stdio::from(input))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(cmd, e))?;
    check(cmd, &output)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Locate an executable by name
///
/// An explicitly configured path always wins. Otherwise `PATH` is searched,
/// then the Homebrew prefix on macOS where `mysql-client` is keg-only.
pub fn resolve_binary(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if is_executable(path) {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!(
            "configured {} path {} is not an executable file",
            name,
            path.display()
        ));
    }

    if let Some(paths) = env::var_os("PATH") {
        if let Some(found) = env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
        {
            return Ok(found);
        }
    }

    if cfg!(target_os = "macos") {
        if let Ok(prefix) = capture_stdout(Command::new("brew").arg("--prefix")) {
            let prefix = PathBuf::from(prefix.trim());
            for candidate in [
                prefix.join("bin").join(name),
                prefix.join("opt/mysql-client/bin").join(name),
            ] {
                if is_executable(&candidate) {
                    return Ok(candidate);
                }
            }
        }
    }

    Err(RedefinerError::BinaryNotFound(name.to_string()).into())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_capture_stdout() {
        let out = capture_stdout(&mut sh("printf 'app_db\\nsys\\n'")).unwrap();
        assert_eq!(out, "app_db\nsys\n");
    }

    #[test]
    fn test_failure_carries_stderr() {
        let err = capture_stdout(&mut sh("echo 'access denied' >&2; exit 3")).unwrap_err();
        match err.downcast_ref::<RedefinerError>() {
            Some(RedefinerError::CommandFailed { program, stderr, .. }) => {
                assert!(program.starts_with("sh -c"));
                assert_eq!(stderr, "access denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_stdout_to_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.sql");

        stdout_to_file(&mut sh("echo 'CREATE PROCEDURE p() BEGIN END;'"), &dest).unwrap();
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "CREATE PROCEDURE p() BEGIN END;\n"
        );
    }

    #[test]
    fn test_stdout_to_file_keeps_previous_content_on_failure() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.sql");
        std::fs::write(&dest, "previous").unwrap();

        let result = stdout_to_file(&mut sh("echo partial; exit 1"), &dest);
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous");
    }

    #[test]
    fn test_stdin_from_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.sql");
        let copy = dir.path().join("copy.sql");
        std::fs::write(&source, "SELECT 1;\n").unwrap();

        let script = format!("cat > '{}'", copy.display());
        stdin_from_file(&mut sh(&script), &source).unwrap();
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "SELECT 1;\n");
    }

    #[test]
    fn test_stdin_from_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = stdin_from_file(&mut sh("cat"), &dir.path().join("absent.sql"));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_configured_binary() {
        let found = resolve_binary("sh", Some(Path::new("/bin/sh"))).unwrap();
        assert_eq!(found, PathBuf::from("/bin/sh"));

        let dir = TempDir::new().unwrap();
        let not_exec = dir.path().join("mysql");
        std::fs::write(&not_exec, "").unwrap();
        assert!(resolve_binary("mysql", Some(&not_exec)).is_err());
    }

    #[test]
    fn test_resolve_binary_from_path() {
        assert!(resolve_binary("sh", None).is_ok());
        let err = resolve_binary("definitely-not-a-real-binary-name", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RedefinerError>(),
            Some(RedefinerError::BinaryNotFound(_))
        ));
    }
}
