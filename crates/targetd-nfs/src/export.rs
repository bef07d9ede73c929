//! A single NFS export: host, path and options

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::options::{ExportFlags, ExportOptions, KeyValueOptions};

/// Host string `exportfs -v` prints for exports open to everyone.
pub const WORLD_HOST: &str = "<world>";

/// An exported path for one host.
///
/// Two exports are equal when host and path match; options are ignored so an
/// export can be matched across files even when its options differ.
#[derive(Debug, Clone)]
pub struct Export {
    host: String,
    path: String,
    options: ExportOptions,
}

impl Export {
    pub fn new(host: &str, path: &str, options: ExportOptions) -> Self {
        let host = if host == WORLD_HOST { "*" } else { host };
        Self {
            host: host.to_string(),
            path: path.to_string(),
            options,
        }
    }

    /// Builds an export from raw flags and key-values, validating the flags.
    pub fn with_options(
        host: &str,
        path: &str,
        flags: ExportFlags,
        key_values: KeyValueOptions,
    ) -> Result<Self> {
        Ok(Self::new(host, path, ExportOptions::new(flags, key_values)?))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn options_list(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .options
            .flags()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();
        out.extend(
            self.options
                .key_values()
                .iter()
                .map(|(k, v)| format!("{}={}", k, v)),
        );
        out
    }

    pub fn options_string(&self) -> String {
        self.options.to_string()
    }

    /// `host:path`, the form exportfs takes on its command line.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.path)
    }

    /// Renders the export as one exports(5) line, newline terminated.
    pub fn to_line(&self) -> String {
        format!(
            "{} {}({})\n",
            escape_token(&self.path),
            self.host,
            self.options_string()
        )
    }
}

impl PartialEq for Export {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.host == other.host
    }
}

impl Eq for Export {}

impl Hash for Export {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<50} {}({})",
            escape_token(&self.path),
            self.host,
            self.options_string()
        )
    }
}

/// Writes `s` as one exports(5) token.
///
/// Whitespace other than a space, quotes, `\` and `#` become `\NNN` octal
/// escapes of their UTF-8 bytes. A token holding spaces is double quoted.
fn escape_token(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '"' | '\'' | '\\' | '#') || (c.is_whitespace() && c != ' ') {
            let mut utf8 = [0u8; 4];
            for byte in c.encode_utf8(&mut utf8).bytes() {
                out.push_str(&format!("\\{:03o}", byte));
            }
        } else {
            out.push(c);
        }
    }

    if out.contains(' ') {
        format!("\"{}\"", out)
    } else {
        out
    }
}
