use crate::error::{Error, Result};
use log::{trace, warn};
use std::path::PathBuf;
use std::process::Command;

/// Something that can answer a tshark query with its textual stdout.
pub trait CaptureQuery {
    fn query(&self, args: &[String]) -> Result<String>;
}

/// Runs the real `tshark` binary, one blocking process per query.
#[derive(Debug, Clone)]
pub struct Tshark {
    program: PathBuf,
}

impl Tshark {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Default for Tshark {
    fn default() -> Self {
        Self::new("tshark")
    }
}

impl CaptureQuery for Tshark {
    fn query(&self, args: &[String]) -> Result<String> {
        trace!("{} {}", self.program_name(), args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| Error::Spawn {
                program: self.program_name(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            // Truncated captures exit non-zero after printing every packet read
            if stdout.trim().is_empty() {
                return Err(Error::Tshark {
                    program: self.program_name(),
                    status: output.status.to_string(),
                    stderr: stderr.trim().to_string(),
                });
            }
            warn!(
                "{} exited with {}, keeping partial output: {}",
                self.program_name(),
                output.status,
                stderr.trim()
            );
        } else if !stderr.trim().is_empty() {
            // tshark prints dissector warnings on stderr even on success
            trace!("{} stderr: {}", self.program_name(), stderr.trim());
        }

        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_tshark(dir: &std::path::Path, body: &str) -> Tshark {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("tshark");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Tshark::new(path)
    }

    #[cfg(unix)]
    #[test]
    fn returns_stdout_and_passes_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let tshark = fake_tshark(dir.path(), r#"echo "$2"; echo 'Epan warning' >&2"#);
        let out = tshark.query(&["-r".to_string(), "a.pcap".to_string()]).unwrap();
        assert_eq!(out, "a.pcap\n");
    }

    #[cfg(unix)]
    #[test]
    fn truncated_capture_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let tshark = fake_tshark(
            dir.path(),
            "printf '0\\n1\\n'; echo 'appears to have been cut short' >&2; exit 2",
        );
        let out = tshark.query(&[]).unwrap();
        assert_eq!(crate::inspector::parse_stream_ids(&out), vec![0, 1]);
    }

    #[cfg(unix)]
    #[test]
    fn failure_without_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tshark = fake_tshark(dir.path(), "echo 'no such file' >&2; exit 1");
        let err = tshark.query(&[]).unwrap_err();
        match err {
            Error::Tshark { stderr, .. } => assert_eq!(stderr, "no such file"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let tshark = Tshark::new("/nonexistent/tshark-binary");
        let err = tshark.query(&["-v".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
