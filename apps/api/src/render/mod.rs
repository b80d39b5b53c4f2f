//! LaTeX → PDF compilation through an external binary.
//!
//! Success is decided by whether the expected PDF exists after the run, not by
//! the exit code: pdflatex exits non-zero on recoverable errors while still
//! writing a usable document.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Characters of stdout kept when stderr is empty. pdflatex reports errors on stdout.
const DIAGNOSTIC_TAIL_CHARS: usize = 2000;
const AUX_EXTENSIONS: &[&str] = &["aux", "log", "out"];

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("LaTeX compiler not found at '{0}'. Install a TeX distribution or set LATEX_COMPILER")]
    NotFound(String),

    #[error("Failed to run LaTeX compiler: {0}")]
    Io(#[from] std::io::Error),

    #[error("LaTeX compilation failed (exit code {exit_code:?}), no PDF produced: {diagnostics}")]
    NoOutput {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("Source file has no usable name: {0}")]
    InvalidSource(PathBuf),
}

/// Turns a source document into a compiled one inside `output_dir`.
///
/// Carried by the pipeline as `Arc<dyn DocumentCompiler>`.
#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    async fn compile(&self, source: &Path, output_dir: &Path) -> Result<PathBuf, CompileError>;
}

/// Runs `<binary> -interaction=nonstopmode -output-directory <dir> <source>`.
#[derive(Debug, Clone)]
pub struct LatexCompiler {
    binary: String,
}

impl LatexCompiler {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl DocumentCompiler for LatexCompiler {
    async fn compile(&self, source: &Path, output_dir: &Path) -> Result<PathBuf, CompileError> {
        let stem = source
            .file_stem()
            .ok_or_else(|| CompileError::InvalidSource(source.to_path_buf()))?;
        let stem = stem.to_string_lossy().into_owned();
        let expected = output_dir.join(format!("{stem}.pdf"));

        // A PDF left over from an earlier run would mask a fatal error.
        match tokio::fs::remove_file(&expected).await {
            Ok(()) => debug!("Removed stale {}", expected.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CompileError::Io(e)),
        }

        let output = Command::new(&self.binary)
            .arg("-interaction=nonstopmode")
            .arg("-output-directory")
            .arg(output_dir)
            .arg(source)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CompileError::NotFound(self.binary.clone()),
                _ => CompileError::Io(e),
            })?;

        remove_aux_files(output_dir, &stem).await;

        if tokio::fs::try_exists(&expected).await? {
            if !output.status.success() {
                warn!(
                    "{} exited with {:?} but produced {}",
                    self.binary,
                    output.status.code(),
                    expected.display()
                );
            }
            return Ok(expected);
        }

        Err(CompileError::NoOutput {
            exit_code: output.status.code(),
            diagnostics: diagnostics(&output.stderr, &output.stdout),
        })
    }
}

/// Captured stderr, or the tail of stdout when stderr is empty.
fn diagnostics(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_string();
    }

    let stdout = String::from_utf8_lossy(stdout);
    let stdout = stdout.trim();
    let count = stdout.chars().count();
    if count <= DIAGNOSTIC_TAIL_CHARS {
        return stdout.to_string();
    }
    stdout.chars().skip(count - DIAGNOSTIC_TAIL_CHARS).collect()
}

async fn remove_aux_files(output_dir: &Path, stem: &str) {
    for ext in AUX_EXTENSIONS {
        let path = output_dir.join(format!("{stem}.{ext}"));
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Could not remove {}: {e}", path.display());
            }
        }
    }
}
