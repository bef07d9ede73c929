//! Live export management through exportfs, and the generated exports file.
//!
//! Exports added at runtime only live in the kernel export table until the
//! next reload. After every successful change the exporter rewrites its own
//! file in the drop-in directory with the active exports that the main
//! exports file does not already declare, so that a reload of both files
//! restores the same table without declaring anything twice.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::command::{CommandOutput, CommandRunner, SystemCommandRunner};
use crate::config::NfsConfig;
use crate::error::{NfsError, Result};
use crate::export::Export;
use crate::exports_file::{parse_exportfs_output, parse_exports_file};
use crate::options::{ExportFlags, KeyValueOptions};

/// exportfs exit code for a rejected option.
pub const EXIT_INVALID_OPTION: i32 = 22;

/// Adds, removes and lists NFS exports and keeps the generated file in sync.
pub struct NfsExporter<R: CommandRunner = SystemCommandRunner> {
    config: NfsConfig,
    runner: R,
    resync_lock: Mutex<()>,
}

impl NfsExporter<SystemCommandRunner> {
    /// Exporter that runs the real exportfs binary.
    pub fn system(config: NfsConfig) -> Self {
        Self::new(config, SystemCommandRunner)
    }
}

impl<R: CommandRunner> NfsExporter<R> {
    pub fn new(config: NfsConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            resync_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &NfsConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn command(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.config.exportfs_cmd.clone())
            .chain(args.iter().map(|a| a.to_string()))
            .collect()
    }

    fn unexpected(argv: Vec<String>, out: &CommandOutput) -> NfsError {
        NfsError::UnexpectedExit {
            command: argv,
            code: out.exit_code,
            output: out.combined(),
        }
    }

    /// Lists the exports currently active in the kernel.
    pub fn exports(&self) -> Result<Vec<Export>> {
        let argv = self.command(&["-v"]);
        let out = self.runner.invoke(&argv)?;
        if !out.success() {
            return Err(Self::unexpected(argv, &out));
        }
        parse_exportfs_output(&out.stdout)
    }

    /// Exports `path` to `host` and resyncs the generated file.
    pub fn export_add(
        &self,
        host: &str,
        path: &str,
        flags: ExportFlags,
        key_values: KeyValueOptions,
    ) -> Result<()> {
        let export = Export::with_options(host, path, flags, key_values)?;
        let options = export.options_string();

        let mut argv = self.command(&[]);
        if !options.is_empty() {
            argv.push("-o".to_string());
            argv.push(options);
        }
        argv.push(export.target());

        let out = self.runner.invoke(&argv)?;
        match out.exit_code {
            0 => {
                info!(host = export.host(), path = export.path(), "export added");
                self.resync()
            }
            EXIT_INVALID_OPTION => Err(NfsError::InvalidOption { stderr: out.stderr }),
            _ => Err(Self::unexpected(argv, &out)),
        }
    }

    /// Unexports an active export and resyncs the generated file.
    pub fn export_remove(&self, export: &Export) -> Result<()> {
        if !self.exports()?.contains(export) {
            return Err(NfsError::ExportNotFound {
                host: export.host().to_string(),
                path: export.path().to_string(),
            });
        }

        let target = export.target();
        let argv = self.command(&["-u", target.as_str()]);
        let out = self.runner.invoke(&argv)?;
        if !out.success() {
            return Err(Self::unexpected(argv, &out));
        }

        info!(host = export.host(), path = export.path(), "export removed");
        self.resync()
    }

    /// Rewrites the generated file with active exports not declared in the
    /// main exports file.
    ///
    /// Calls are serialized. The new content replaces the old file in a
    /// single rename; if listing fails the old file is left as it was.
    pub fn resync(&self) -> Result<()> {
        let _guard = self
            .resync_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let declared = self.declared_exports()?;
        let active = self.exports()?;

        let declared: HashSet<&Export> = declared.iter().collect();
        let runtime: Vec<&Export> = active.iter().filter(|e| !declared.contains(e)).collect();
        let content: String = runtime.iter().map(|e| e.to_line()).collect();

        let target = self.config.generated_file();
        write_atomic(&target, content.as_bytes())?;

        info!(
            file = %target.display(),
            active = active.len(),
            written = runtime.len(),
            "generated exports resynced"
        );
        Ok(())
    }

    fn declared_exports(&self) -> Result<Vec<Export>> {
        match parse_exports_file(&self.config.main_export_file) {
            Ok(exports) => Ok(exports),
            Err(NfsError::ExportsFile { path, source }) if source.kind() == ErrorKind::NotFound => {
                warn!(file = %path.display(), "main exports file missing, nothing declared");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// Writes `data` to a sibling temp file, syncs it, and renames it over `path`.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_path = path.to_path_buf();
    tmp_path.set_extension("tmp");

    {
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    debug!(file = %path.display(), bytes = data.len(), "file replaced");
    Ok(())
}
