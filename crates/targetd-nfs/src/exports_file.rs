//! Parsers for exports(5) definition files and `exportfs -v` listings.
//!
//! Definition files are read line by line. Each line is split into
//! shell-style tokens: the first is the path, the first `-`-prefixed token
//! holds options shared by every host on the line, and the remaining tokens
//! are `host(options)` or bare `host` entries. `\NNN` octal escapes are
//! decoded into literal bytes that never act as delimiters, so paths
//! and hosts may carry spaces, quotes or parentheses.
//!
//! A line that fails to parse is logged and skipped. Failure to read the
//! file itself is an error, never an empty result.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{error, warn};

use crate::error::{NfsError, Result};
use crate::export::Export;
use crate::option_parser::{merge_options, parse_option_string};

/// `<path><ws><host>(<options>)` as printed by `exportfs -v`.
const LISTING_PATTERN: &str = r"([/a-zA-Z0-9.\-_\\]+)\s+(.+)\((.+)\)";

static LISTING_RE: OnceLock<Regex> = OnceLock::new();
static OCTAL_RE: OnceLock<Regex> = OnceLock::new();

fn listing_re() -> &'static Regex {
    LISTING_RE.get_or_init(|| Regex::new(LISTING_PATTERN).expect("listing pattern is valid"))
}

fn octal_re() -> &'static Regex {
    OCTAL_RE.get_or_init(|| Regex::new(r"\\([0-7]{3})").expect("octal pattern is valid"))
}

fn octal_byte(digits: &str) -> Option<u8> {
    u8::from_str_radix(digits, 8).ok()
}

/// Builds a string from decoded bytes; invalid UTF-8 is replaced lossily.
fn bytes_to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut utf8 = [0u8; 4];
    buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
}

/// Replaces every `\NNN` octal escape with the byte it encodes.
///
/// Escapes above `\377` are not bytes and are kept as written.
pub fn decode_octal_escapes(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    let mut last = 0;
    for caps in octal_re().captures_iter(s) {
        let (Some(whole), Some(byte)) = (caps.get(0), octal_byte(&caps[1])) else {
            continue;
        };
        out.extend_from_slice(s[last..whole.start()].as_bytes());
        out.push(byte);
        last = whole.end();
    }
    out.extend_from_slice(s[last..].as_bytes());
    bytes_to_string(out)
}

#[derive(Clone, Copy, PartialEq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Returns the decoded byte when `chars` starts with an octal byte escape.
fn take_octal(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<u8> {
    let ahead: String = chars.clone().take(3).collect();
    if ahead.len() == 3 && ahead.chars().all(|c| ('0'..='7').contains(&c)) {
        let decoded = octal_byte(&ahead)?;
        for _ in 0..3 {
            chars.next();
        }
        return Some(decoded);
    }
    None
}

/// Splits a line into POSIX shell-style tokens, dropping `#` comments.
pub fn split_tokens(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut in_token = false;
    let mut quote = Quote::None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(decoded) = take_octal(&mut chars) {
                current.push(decoded);
                in_token = true;
                continue;
            }
        }

        match quote {
            Quote::None => match c {
                '#' => break,
                '\'' => {
                    quote = Quote::Single;
                    in_token = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_token = true;
                }
                '\\' => match chars.next() {
                    Some(escaped) => {
                        push_char(&mut current, escaped);
                        in_token = true;
                    }
                    None => return Err("no escaped character".to_string()),
                },
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(bytes_to_string(std::mem::take(&mut current)));
                        in_token = false;
                    }
                }
                c => {
                    push_char(&mut current, c);
                    in_token = true;
                }
            },
            Quote::Single => match c {
                '\'' => quote = Quote::None,
                c => push_char(&mut current, c),
            },
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.peek() {
                    Some(&next) if next == '"' || next == '\\' => {
                        push_char(&mut current, next);
                        chars.next();
                    }
                    _ => current.push(b'\\'),
                },
                c => push_char(&mut current, c),
            },
        }
    }

    if quote != Quote::None {
        return Err("no closing quotation".to_string());
    }
    if in_token {
        tokens.push(bytes_to_string(current));
    }
    Ok(tokens)
}

/// Splits `host(options)`, `(options)` or `host` into host and option text.
fn split_host_token(token: &str) -> std::result::Result<(String, String), String> {
    let has_open = token.contains('(');
    let has_close = token.contains(')');

    if has_open && has_close {
        let open = token.find('(').unwrap_or(0);
        let body = token
            .strip_suffix(')')
            .ok_or_else(|| format!("text after option group in {:?}", token))?;
        let host = &body[..open];
        let options = &body[open + 1..];
        if host.contains(')') || options.contains('(') || options.contains(')') {
            return Err(format!("nested option group in {:?}", token));
        }
        let host = if host.is_empty() { "*" } else { host };
        Ok((host.to_string(), options.to_string()))
    } else if has_open || has_close {
        Err(format!("unbalanced parenthesis in {:?}", token))
    } else if token.is_empty() {
        Err("empty host".to_string())
    } else {
        Ok((token.to_string(), String::new()))
    }
}

/// Parses one exports(5) line into zero or more exports.
pub fn parse_export_line(line: &str) -> Result<Vec<Export>> {
    let parse_err = |reason: String| NfsError::Parse {
        line: line.trim_end().to_string(),
        reason,
    };

    let mut tokens = split_tokens(line).map_err(parse_err)?.into_iter();
    let path = match tokens.next() {
        Some(path) => path,
        None => return Ok(Vec::new()),
    };

    let mut global: Option<String> = None;
    let mut hosts = Vec::new();
    for token in tokens {
        if let Some(options) = token.strip_prefix('-') {
            if global.is_none() {
                global = Some(options.to_string());
            } else {
                warn!(path = %path, token = %token, "ignoring extra global option group");
            }
            continue;
        }
        hosts.push(split_host_token(&token).map_err(parse_err)?);
    }
    let global = global.unwrap_or_default();

    if hosts.is_empty() {
        let (flags, key_values) = parse_option_string(&global)?;
        return Ok(vec![Export::with_options("*", &path, flags, key_values)?]);
    }

    hosts
        .into_iter()
        .map(|(host, specific)| {
            let (flags, key_values) = merge_options(&global, Some(&specific))?;
            Export::with_options(&host, &path, flags, key_values)
        })
        .collect()
}

/// Parses the contents of an exports(5) file, skipping malformed lines.
pub fn parse_exports_text(text: &str) -> Vec<Export> {
    let mut exports = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_export_line(line) {
            Ok(found) => exports.extend(found),
            Err(e) => error!(line = idx + 1, error = %e, "skipping malformed export line"),
        }
    }
    exports
}

/// Reads and parses an exports(5) file.
pub fn parse_exports_file(path: &Path) -> Result<Vec<Export>> {
    let raw = std::fs::read(path).map_err(|source| NfsError::ExportsFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_exports_text(&String::from_utf8_lossy(&raw)))
}

/// Parses `exportfs -v` output. Options are taken as given, with no merge.
///
/// The pattern is matched over the whole text because exportfs puts the host
/// on a continuation line when the path is long.
pub fn parse_exportfs_output(text: &str) -> Result<Vec<Export>> {
    listing_re()
        .captures_iter(text)
        .map(|caps| {
            let path = decode_octal_escapes(&caps[1]);
            let (flags, key_values) = parse_option_string(&caps[3])?;
            Export::with_options(caps[2].trim(), &path, flags, key_values)
        })
        .collect()
}
