//! Module scanning with per-file failure isolation.

use crate::error::LoadError;
use crate::module::{LoadedModule, ModuleLoader};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Most underlying causes logged for one partially loaded module.
pub const MAX_REPORTED_CAUSES: usize = 5;

/// A candidate module file found during a scan.
#[derive(Debug, Clone)]
pub struct ModuleFile {
    pub path: PathBuf,
    pub discovered_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The file is not a mod; skipped
    NotAModule,
    /// The mod loaded but some types did not resolve; kept
    PartialLoad,
    /// Any other load-time failure; skipped
    Fault,
    /// The mod directory itself could not be read
    DirectoryUnreadable,
}

/// What went wrong with one file (or the directory) during a scan.
#[derive(Debug, Clone)]
pub struct ScanDiagnostic {
    pub file: PathBuf,
    pub kind: DiagnosticKind,
    /// At most [`MAX_REPORTED_CAUSES`] messages
    pub messages: Vec<String>,
    /// Messages dropped past the cap
    pub truncated: usize,
}

/// Result of one scan pass.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Modules that loaded fully or partially, in file order
    pub modules: Vec<LoadedModule>,
    pub diagnostics: Vec<ScanDiagnostic>,
}

/// Lists the files in `dir` with the given extension, sorted by file name.
/// Subdirectories are not searched. Entries that cannot be read are logged and
/// skipped; only failing to open `dir` itself is an error.
pub fn enumerate_module_files(dir: &Path, extension: &str) -> io::Result<Vec<ModuleFile>> {
    let entries = std::fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path()));
    Ok(filter_module_files(entries, extension))
}

fn filter_module_files<I>(entries: I, extension: &str) -> Vec<ModuleFile>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut files = Vec::new();

    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping unreadable mod directory entry: {}", e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false);

        if matches {
            files.push(ModuleFile {
                path,
                discovered_at: SystemTime::now(),
            });
        }
    }

    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    files
}

/// Loads every module file in `dir`. One file's failure never stops the scan.
///
/// # Arguments
///
/// * `dir` - The mod directory. A missing directory is an empty scan.
/// * `extension` - Module file extension without the dot, matched
///   case-insensitively
/// * `loader` - Turns each file into a [`LoadedModule`]
///
/// # Returns
///
/// A [`ScanReport`] holding every module that loaded fully or partially, in
/// file-name order, plus one [`ScanDiagnostic`] per problem:
///
/// * files that are not mods are skipped with a warning
/// * partially loaded mods are kept; at most [`MAX_REPORTED_CAUSES`] causes are
///   logged and recorded, followed by a count of the rest
/// * any other failure, including a panicking loader, skips that file only
pub fn scan_modules(dir: &Path, extension: &str, loader: &dyn ModuleLoader) -> ScanReport {
    let mut report = ScanReport::default();

    if !dir.exists() {
        warn!("Mod directory does not exist: {}", dir.display());
        return report;
    }

    let files = match enumerate_module_files(dir, extension) {
        Ok(files) => files,
        Err(e) => {
            error!("Failed to read mod directory {}: {}", dir.display(), e);
            report.diagnostics.push(ScanDiagnostic {
                file: dir.to_path_buf(),
                kind: DiagnosticKind::DirectoryUnreadable,
                messages: vec![e.to_string()],
                truncated: 0,
            });
            return report;
        }
    };

    info!(
        "🔍 Found {} candidate mod file(s) in {}",
        files.len(),
        dir.display()
    );

    for file in files {
        let outcome = catch_unwind(AssertUnwindSafe(|| loader.load(&file))).unwrap_or_else(|_| {
            Err(LoadError::Fault {
                path: file.path.clone(),
                reason: "loader panicked".to_string(),
            })
        });

        match outcome {
            Ok(module) => {
                debug!(
                    "Loaded mod {} from {} ({} types)",
                    module.name(),
                    file.path.display(),
                    module.types().len()
                );
                report.modules.push(module);
            }
            Err(LoadError::PartiallyLoaded { module, causes }) => {
                warn!(
                    "Mod {} loaded partially from {}; {} type(s) failed to resolve",
                    module.name(),
                    file.path.display(),
                    causes.len()
                );
                let diagnostic = bounded_diagnostic(&file.path, DiagnosticKind::PartialLoad, causes);
                for cause in &diagnostic.messages {
                    warn!("  {}", cause);
                }
                if diagnostic.truncated > 0 {
                    warn!("  ... and {} more", diagnostic.truncated);
                }
                report.diagnostics.push(diagnostic);
                report.modules.push(module);
            }
            Err(e @ LoadError::NotAModule { .. }) => {
                warn!("Skipping {}", e);
                report.diagnostics.push(ScanDiagnostic {
                    file: file.path,
                    kind: DiagnosticKind::NotAModule,
                    messages: vec![e.to_string()],
                    truncated: 0,
                });
            }
            Err(e) => {
                error!("{}", e);
                report.diagnostics.push(ScanDiagnostic {
                    file: file.path,
                    kind: DiagnosticKind::Fault,
                    messages: vec![e.to_string()],
                    truncated: 0,
                });
            }
        }
    }

    report
}

fn bounded_diagnostic(file: &Path, kind: DiagnosticKind, mut causes: Vec<String>) -> ScanDiagnostic {
    let truncated = causes.len().saturating_sub(MAX_REPORTED_CAUSES);
    causes.truncate(MAX_REPORTED_CAUSES);
    ScanDiagnostic {
        file: file.to_path_buf(),
        kind,
        messages: causes,
        truncated,
    }
}
