//! Shared fixtures for the exporter integration tests.

#![allow(dead_code)]

use std::fs;
use std::sync::Mutex;

use tempfile::TempDir;

use targetd_nfs::{CommandOutput, CommandRunner, NfsConfig, NfsExporter};

/// In-memory stand-in for exportfs.
///
/// Keeps an export table that `host:path` adds and `-u` removes mutate, and
/// renders it for `-v` the way exportfs does. Every argv is recorded.
#[derive(Default)]
pub struct FakeExportfs {
    table: Mutex<Vec<(String, String, String)>>,
    calls: Mutex<Vec<Vec<String>>>,
    add_result: Mutex<Option<CommandOutput>>,
    remove_result: Mutex<Option<CommandOutput>>,
    list_result: Mutex<Option<CommandOutput>>,
}

impl FakeExportfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the active table with `host`, `path` and an option list.
    pub fn with_active(self, host: &str, path: &str, options: &str) -> Self {
        self.table
            .lock()
            .unwrap()
            .push((host.to_string(), path.to_string(), options.to_string()));
        self
    }

    pub fn fail_add(&self, out: CommandOutput) {
        *self.add_result.lock().unwrap() = Some(out);
    }

    pub fn fail_remove(&self, out: CommandOutput) {
        *self.remove_result.lock().unwrap() = Some(out);
    }

    pub fn fail_list(&self, out: CommandOutput) {
        *self.list_result.lock().unwrap() = Some(out);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, flag: &str) -> usize {
        self.calls()
            .iter()
            .filter(|argv| argv.get(1).map(String::as_str) == Some(flag))
            .count()
    }

    fn listing(&self) -> String {
        self.table
            .lock()
            .unwrap()
            .iter()
            .map(|(host, path, opts)| {
                let host = if host == "*" { "<world>" } else { host.as_str() };
                format!("{}\t\t{}({})\n", escape_listing_path(path), host, opts)
            })
            .collect()
    }
}

/// Octal-escapes every byte outside `[A-Za-z0-9/._-]`, as exportfs prints paths.
fn escape_listing_path(path: &str) -> String {
    path.bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b"/._-".contains(&b) {
                (b as char).to_string()
            } else {
                format!("\\{:03o}", b)
            }
        })
        .collect()
}

impl CommandRunner for FakeExportfs {
    fn invoke(&self, argv: &[String]) -> targetd_nfs::Result<CommandOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());

        match argv.get(1).map(String::as_str) {
            Some("-v") => {
                if let Some(out) = self.list_result.lock().unwrap().clone() {
                    return Ok(out);
                }
                Ok(CommandOutput::new(0, &self.listing(), ""))
            }
            Some("-u") => {
                if let Some(out) = self.remove_result.lock().unwrap().clone() {
                    return Ok(out);
                }
                let (host, path) = argv[2].split_once(':').unwrap();
                self.table
                    .lock()
                    .unwrap()
                    .retain(|(h, p, _)| !(h == host && p == path));
                Ok(CommandOutput::new(0, "", ""))
            }
            _ => {
                if let Some(out) = self.add_result.lock().unwrap().clone() {
                    return Ok(out);
                }
                let options = if argv.get(1).map(String::as_str) == Some("-o") {
                    argv[2].clone()
                } else {
                    String::new()
                };
                let target = argv.last().unwrap();
                let (host, path) = target.split_once(':').unwrap();
                self.table
                    .lock()
                    .unwrap()
                    .push((host.to_string(), path.to_string(), options));
                Ok(CommandOutput::new(0, "", ""))
            }
        }
    }
}

/// Config whose exports files all live under `dir`.
pub fn config_in(dir: &TempDir) -> NfsConfig {
    NfsConfig {
        exportfs_cmd: "exportfs".to_string(),
        export_dir: dir.path().join("exports.d"),
        export_file: "targetd.exports".to_string(),
        main_export_file: dir.path().join("exports"),
    }
}

/// Writes the main exports file under `dir`.
pub fn write_main_exports(dir: &TempDir, content: &str) {
    fs::write(dir.path().join("exports"), content).unwrap();
}

pub fn exporter(dir: &TempDir, fake: FakeExportfs) -> NfsExporter<FakeExportfs> {
    NfsExporter::new(config_in(dir), fake)
}

pub fn generated(exporter: &NfsExporter<FakeExportfs>) -> String {
    fs::read_to_string(exporter.config().generated_file()).unwrap()
}
