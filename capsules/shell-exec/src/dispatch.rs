//! Language → toolchain dispatch for code snippets.
//!
//! A snippet is written to a uniquely named file under the workspace and turned
//! into an ordered plan of shell commands: a single run step for interpreted
//! languages, compile then run for compiled ones. The binary path is derived
//! from the temp file's unique stem, so concurrent compiles never share an
//! output path.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

use crate::error::ExecError;
use crate::types::Stage;

const SOURCE_PREFIX: &str = "exec-";
const FALLBACK_EXTENSION: &str = "txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    fn quote(self, path: &Path) -> String {
        let raw = path.to_string_lossy();
        match self {
            Platform::Posix => shell_words::quote(&raw).into_owned(),
            Platform::Windows => format!("\"{}\"", raw),
        }
    }

    fn binary_extension(self) -> &'static str {
        match self {
            Platform::Posix => "out",
            Platform::Windows => "exe",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Invocation {
    /// `<template>` with `{src}` substituted.
    Interpret(&'static str),
    /// `<template>` with `{src}`/`{bin}` substituted, then the binary is run.
    Compile(&'static str),
}

/// `(language, extension)`; extensions exist for more languages than can run.
const EXTENSIONS: &[(&str, &str)] = &[
    ("python", "py"),
    ("javascript", "js"),
    ("typescript", "ts"),
    ("java", "java"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("csharp", "cs"),
    ("go", "go"),
    ("rust", "rs"),
    ("php", "php"),
    ("ruby", "rb"),
    ("swift", "swift"),
    ("kotlin", "kt"),
    ("scala", "scala"),
    ("shell", "sh"),
    ("bash", "sh"),
    ("powershell", "ps1"),
];

const POSIX_INVOCATIONS: &[(&str, Invocation)] = &[
    ("python", Invocation::Interpret("python3 {src}")),
    ("javascript", Invocation::Interpret("node {src}")),
    ("typescript", Invocation::Interpret("npx ts-node {src}")),
    ("java", Invocation::Interpret("java {src}")),
    ("c", Invocation::Compile("gcc -o {bin} {src}")),
    ("cpp", Invocation::Compile("g++ -o {bin} {src}")),
    ("go", Invocation::Interpret("go run {src}")),
    ("rust", Invocation::Compile("rustc {src} -o {bin}")),
    ("php", Invocation::Interpret("php {src}")),
    ("ruby", Invocation::Interpret("ruby {src}")),
    ("shell", Invocation::Interpret("bash {src}")),
    ("bash", Invocation::Interpret("bash {src}")),
];

/// Entries here replace the POSIX entry of the same language on Windows.
const WINDOWS_OVERRIDES: &[(&str, Invocation)] = &[
    ("python", Invocation::Interpret("python {src}")),
    ("powershell", Invocation::Interpret("powershell -File {src}")),
];

/// Lowercases and folds common aliases onto table keys.
pub fn canonical_language(language: &str) -> String {
    let lowered = language.trim().to_lowercase();
    let canonical = match lowered.as_str() {
        "py" | "python3" => "python",
        "js" | "node" | "nodejs" => "javascript",
        "ts" => "typescript",
        "c++" | "cxx" => "cpp",
        "c#" | "cs" => "csharp",
        "golang" => "go",
        "rs" => "rust",
        "rb" => "ruby",
        "sh" => "shell",
        "ps1" | "pwsh" => "powershell",
        other => other,
    };
    canonical.to_string()
}

pub fn extension_for(language: &str) -> &'static str {
    let key = canonical_language(language);
    EXTENSIONS
        .iter()
        .find(|(lang, _)| *lang == key)
        .map(|(_, ext)| *ext)
        .unwrap_or(FALLBACK_EXTENSION)
}

fn invocation_for(language: &str, platform: Platform) -> Option<Invocation> {
    let lookup = |table: &[(&str, Invocation)]| {
        table
            .iter()
            .find(|(lang, _)| *lang == language)
            .map(|(_, inv)| *inv)
    };
    match platform {
        Platform::Windows => lookup(WINDOWS_OVERRIDES).or_else(|| lookup(POSIX_INVOCATIONS)),
        Platform::Posix => lookup(POSIX_INVOCATIONS),
    }
}

/// One sub-command of a toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub stage: Stage,
    pub command: String,
}

/// A snippet on disk plus the commands that run it.
#[derive(Debug)]
pub struct PreparedCode {
    pub language: String,
    pub steps: Vec<PlanStep>,
    pub source: TempSourceFile,
}

impl PreparedCode {
    /// The plan as one display string, e.g. for the `command` field of a result.
    pub fn command_line(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.command.as_str())
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

/// Source file (and build artefact) removed on every exit path.
///
/// Removal failures are logged and swallowed so they never mask the outcome
/// of the execution that used the file.
#[derive(Debug)]
pub struct TempSourceFile {
    path: Option<TempPath>,
    location: PathBuf,
    artifacts: Vec<PathBuf>,
}

impl TempSourceFile {
    pub fn path(&self) -> &Path {
        &self.location
    }

    pub fn file_name(&self) -> String {
        self.location
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub fn cleanup(mut self) {
        self.remove_all();
    }

    fn remove_all(&mut self) {
        for artifact in self.artifacts.drain(..) {
            match fs::remove_file(&artifact) {
                Ok(()) => debug!(path = %artifact.display(), "removed build artefact"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %artifact.display(), "failed to remove build artefact: {}", e),
            }
        }
        if let Some(path) = self.path.take() {
            if let Err(e) = path.close() {
                warn!(path = %self.location.display(), "failed to remove temp source: {}", e);
            }
        }
    }
}

impl Drop for TempSourceFile {
    fn drop(&mut self) {
        self.remove_all();
    }
}

#[derive(Debug, Clone)]
pub struct LanguageDispatcher {
    dir: PathBuf,
    platform: Platform,
}

impl LanguageDispatcher {
    /// Temp sources are created in `dir`, normally the workspace root.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_platform(dir, Platform::current())
    }

    pub fn with_platform(dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            dir: dir.into(),
            platform,
        }
    }

    pub fn is_supported(&self, language: &str) -> bool {
        invocation_for(&canonical_language(language), self.platform).is_some()
    }

    /// Languages with a toolchain mapping on this dispatcher's platform.
    pub fn supported_languages(&self) -> Vec<&'static str> {
        EXTENSIONS
            .iter()
            .map(|(lang, _)| *lang)
            .filter(|lang| invocation_for(lang, self.platform).is_some())
            .collect()
    }

    /// Writes `source` to a fresh temp file and builds its plan. Unsupported
    /// languages fail before anything touches the disk.
    pub fn prepare(&self, language: &str, source: &str) -> Result<PreparedCode, ExecError> {
        let key = canonical_language(language);
        let invocation =
            invocation_for(&key, self.platform).ok_or_else(|| ExecError::UnsupportedLanguage {
                language: language.to_string(),
            })?;

        let mut file = Builder::new()
            .prefix(SOURCE_PREFIX)
            .suffix(&format!(".{}", extension_for(&key)))
            .tempfile_in(&self.dir)
            .map_err(|e| ExecError::io("Failed to create temp source file", e))?;
        file.write_all(source.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| ExecError::io("Failed to write temp source file", e))?;
        let temp_path = file.into_temp_path();
        let location = temp_path.to_path_buf();

        let src = self.platform.quote(&location);
        let (steps, artifacts) = match invocation {
            Invocation::Interpret(template) => (
                vec![PlanStep {
                    stage: Stage::Run,
                    command: template.replace("{src}", &src),
                }],
                Vec::new(),
            ),
            Invocation::Compile(template) => {
                let binary = location.with_extension(self.platform.binary_extension());
                let bin = self.platform.quote(&binary);
                (
                    vec![
                        PlanStep {
                            stage: Stage::Compile,
                            command: template.replace("{src}", &src).replace("{bin}", &bin),
                        },
                        PlanStep {
                            stage: Stage::Run,
                            command: bin,
                        },
                    ],
                    vec![binary],
                )
            }
        };

        debug!(language = %key, file = %location.display(), steps = steps.len(), "prepared code");

        Ok(PreparedCode {
            language: key,
            steps,
            source: TempSourceFile {
                path: Some(temp_path),
                location,
                artifacts,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_fold_to_table_keys() {
        assert_eq!(canonical_language(" Python3 "), "python");
        assert_eq!(canonical_language("JS"), "javascript");
        assert_eq!(canonical_language("c++"), "cpp");
        assert_eq!(canonical_language("golang"), "go");
        assert_eq!(canonical_language("cobol"), "cobol");
    }

    #[test]
    fn unknown_languages_get_generic_extension() {
        assert_eq!(extension_for("python"), "py");
        assert_eq!(extension_for("bash"), "sh");
        assert_eq!(extension_for("kotlin"), "kt");
        assert_eq!(extension_for("brainfuck"), "txt");
    }

    #[test]
    fn extension_only_languages_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = LanguageDispatcher::with_platform(dir.path(), Platform::Posix);
        for lang in ["csharp", "swift", "kotlin", "scala", "powershell", "cobol"] {
            assert!(!dispatcher.is_supported(lang), "{lang}");
        }
        let windows = LanguageDispatcher::with_platform(dir.path(), Platform::Windows);
        assert!(windows.is_supported("powershell"));
    }

    #[test]
    fn posix_quoting_survives_spaces() {
        let quoted = Platform::Posix.quote(Path::new("/work space/exec-1.py"));
        assert_eq!(quoted, "'/work space/exec-1.py'");
        let quoted = Platform::Windows.quote(Path::new("C:\\ws\\exec-1.py"));
        assert_eq!(quoted, "\"C:\\ws\\exec-1.py\"");
    }
}
