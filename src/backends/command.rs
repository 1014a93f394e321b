//! Learned segmenter that delegates to an external command
//!
//! The command receives a PNG file and must write a PNG with an alpha channel.
//! Arguments may contain `{input}` and `{output}` placeholders; when a
//! placeholder is missing the corresponding path is appended. The default
//! argument template matches the `rembg` CLI (`rembg i <input> <output>`).

use crate::error::{CutoutError, Result};
use crate::inference::LearnedSegmenter;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Placeholder replaced by the input PNG path
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Placeholder replaced by the expected output PNG path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Default time allowed for one segmenter invocation
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const STDERR_EXCERPT_LIMIT: usize = 512;

/// External command segmenter
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    resolved: Option<PathBuf>,
}

impl CommandSegmenter {
    /// Create a segmenter for `program` with an argument template
    ///
    /// The program is resolved against `PATH` once, here.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(program: P, args: Vec<String>) -> Self {
        let program = program.into();
        let resolved = resolve_program(&program);
        let name = program
            .file_name()
            .map_or_else(|| program.display().to_string(), |n| n.to_string_lossy().into_owned());

        if let Some(ref path) = resolved {
            info!(program = %path.display(), "Learned segmenter command available");
        } else {
            debug!(program = %program.display(), "Learned segmenter command not found");
        }

        Self {
            name,
            program,
            args,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            resolved,
        }
    }

    /// `rembg i {input} {output}`
    #[must_use]
    pub fn rembg() -> Self {
        Self::new(
            "rembg",
            vec![
                "i".to_string(),
                INPUT_PLACEHOLDER.to_string(),
                OUTPUT_PLACEHOLDER.to_string(),
            ],
        )
    }

    /// Set the per-invocation timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments with placeholders substituted
    #[must_use]
    pub fn expand_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let mut expanded: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect();

        if !self.args.iter().any(|a| a.contains(INPUT_PLACEHOLDER)) {
            expanded.push(input.into_owned());
        }
        if !self.args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            expanded.push(output.into_owned());
        }

        expanded
    }

    fn run(&self, program: &Path, input: &Path, output: &Path) -> Result<()> {
        let mut stderr_file = tempfile::tempfile()?;
        let args = self.expand_args(input, output);
        debug!(program = %program.display(), ?args, "Spawning segmenter command");

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file.try_clone()?))
            .spawn()
            .map_err(|e| {
                CutoutError::segmenter(format!("Failed to spawn '{}': {}", program.display(), e))
            })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {},
                Err(e) => {
                    terminate(&mut child);
                    return Err(e.into());
                },
            }
            if started.elapsed() >= self.timeout {
                terminate(&mut child);
                return Err(CutoutError::segmenter(format!(
                    "'{}' timed out after {:.1}s",
                    self.name,
                    self.timeout.as_secs_f64()
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let stderr = read_excerpt(&mut stderr_file);
            return Err(CutoutError::segmenter(format!(
                "'{}' exited with {}: {}",
                self.name,
                status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl LearnedSegmenter for CommandSegmenter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.resolved.is_some()
    }

    fn segment(&self, png_bytes: &[u8]) -> Result<Vec<u8>> {
        let program = self.resolved.as_ref().ok_or_else(|| {
            CutoutError::segmenter(format!("'{}' is not installed", self.program.display()))
        })?;

        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.png");
        let output = workdir.path().join("output.png");
        std::fs::write(&input, png_bytes)
            .map_err(|e| CutoutError::file_io_error("write segmenter input", &input, &e))?;

        self.run(program, &input, &output)?;

        let bytes = std::fs::read(&output).map_err(|e| {
            CutoutError::segmenter(format!(
                "'{}' produced no readable output at {}: {}",
                self.name,
                output.display(),
                e
            ))
        })?;
        if bytes.is_empty() {
            return Err(CutoutError::segmenter(format!(
                "'{}' produced an empty output file",
                self.name
            )));
        }

        Ok(bytes)
    }
}

/// Resolve a program name against `PATH`; paths with separators must exist as given
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Kill a running child and reap it so it does not linger as a zombie
fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "Failed to kill segmenter command");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "Failed to reap segmenter command");
    }
}

fn read_excerpt(file: &mut std::fs::File) -> String {
    let mut buffer = Vec::new();
    if file.rewind().is_err() || file.read_to_end(&mut buffer).is_err() {
        return String::new();
    }
    let end = buffer.len().min(STDERR_EXCERPT_LIMIT);
    String::from_utf8_lossy(buffer.get(..end).unwrap_or_default()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_args_substitutes_placeholders() {
        let segmenter = CommandSegmenter::rembg();
        let args = segmenter.expand_args(Path::new("/tmp/in.png"), Path::new("/tmp/out.png"));
        assert_eq!(args, vec!["i", "/tmp/in.png", "/tmp/out.png"]);
    }

    #[test]
    fn test_expand_args_appends_missing_paths() {
        let segmenter = CommandSegmenter::new("matte-tool", vec!["--fast".to_string()]);
        let args = segmenter.expand_args(Path::new("a.png"), Path::new("b.png"));
        assert_eq!(args, vec!["--fast", "a.png", "b.png"]);

        let segmenter = CommandSegmenter::new("matte-tool", vec!["--out={output}".to_string()]);
        let args = segmenter.expand_args(Path::new("a.png"), Path::new("b.png"));
        assert_eq!(args, vec!["--out=b.png", "a.png"]);
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let segmenter = CommandSegmenter::new("definitely-not-a-real-segmenter-binary", vec![]);
        assert!(!segmenter.is_available());
        assert_eq!(segmenter.name(), "definitely-not-a-real-segmenter-binary");
        assert!(matches!(
            segmenter.segment(b"png"),
            Err(CutoutError::Segmenter(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_command_round_trips_bytes() {
        let segmenter = CommandSegmenter::new("cp", vec![]);
        assert!(segmenter.is_available());
        let output = segmenter.segment(b"not really a png").unwrap();
        assert_eq!(output, b"not really a png");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_reports_status() {
        let segmenter = CommandSegmenter::new("false", vec![]);
        let err = segmenter.segment(b"png").unwrap_err();
        assert!(matches!(err, CutoutError::Segmenter(_)));
        assert!(err.to_string().contains("exited with"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_without_output_is_error() {
        let segmenter = CommandSegmenter::new("true", vec![]);
        let err = segmenter.segment(b"png").unwrap_err();
        assert!(err.to_string().contains("no readable output"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_command() {
        // The appended input/output paths land in $0 and $1 of the script
        let segmenter = CommandSegmenter::new(
            "sh",
            vec![
                "-c".to_string(),
                "sleep 5".to_string(),
                "{input}".to_string(),
                "{output}".to_string(),
            ],
        )
        .with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = segmenter.segment(b"png").unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_reaps_running_child() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let started = Instant::now();
        terminate(&mut child);

        assert!(child.try_wait().unwrap().is_some());
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
