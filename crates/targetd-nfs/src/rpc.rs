//! Method dispatch for the NFS export calls exposed to RPC clients.
//!
//! Transport framing and authentication live outside this crate; callers
//! hand over a method name and its JSON params and get back a JSON result or
//! an [`RpcError`] carrying a JSON-RPC style code. Exporter calls block on
//! exportfs, so they run on tokio's blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::error::NfsError;
use crate::export::Export;
use crate::options::{security_options, validate_key_values, ExportFlags, ExportOptions};
use crate::reconciler::NfsExporter;

/// Unknown method
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Params missing or of the wrong shape
pub const INVALID_PARAMS: i64 = -32602;
/// Dispatcher failure unrelated to the request
pub const INTERNAL_ERROR: i64 = -32603;
/// Any failure reported by the NFS subsystem
pub const SUBSYSTEM_ERROR: i64 = -1;

/// Error object returned to RPC clients.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn invalid_params(reason: impl std::fmt::Display) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: format!("invalid method parameter(s): {}", reason),
        }
    }
}

impl From<NfsError> for RpcError {
    fn from(e: NfsError) -> Self {
        Self {
            code: SUBSYSTEM_ERROR,
            message: format!("{}: {}", e.kind().as_str(), e),
        }
    }
}

/// Export as reported by `nfs_export_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub host: String,
    pub path: String,
    pub options: Vec<String>,
}

impl From<&Export> for ExportEntry {
    fn from(e: &Export) -> Self {
        Self {
            host: e.host().to_string(),
            path: e.path().to_string(),
            options: e.options_list(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExportAddParams {
    host: String,
    path: String,
    /// Raw flag bitmask
    #[serde(default)]
    options: u32,
    #[serde(default)]
    key_value_options: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ExportRemoveParams {
    host: String,
    path: String,
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}

fn stringify_values(raw: &BTreeMap<String, Value>) -> Result<BTreeMap<String, String>, RpcError> {
    raw.iter()
        .map(|(k, v)| match v {
            Value::String(s) => Ok((k.clone(), s.clone())),
            Value::Number(n) => Ok((k.clone(), n.to_string())),
            other => Err(RpcError::invalid_params(format!(
                "value of {} must be a string or number, got {}",
                k, other
            ))),
        })
        .collect()
}

/// Dispatches NFS export methods onto an [`NfsExporter`].
pub struct NfsRpc<R: CommandRunner + 'static = SystemCommandRunner> {
    exporter: Arc<NfsExporter<R>>,
}

impl<R: CommandRunner + 'static> Clone for NfsRpc<R> {
    fn clone(&self) -> Self {
        Self {
            exporter: Arc::clone(&self.exporter),
        }
    }
}

impl<R: CommandRunner + 'static> NfsRpc<R> {
    pub fn new(exporter: Arc<NfsExporter<R>>) -> Self {
        Self { exporter }
    }

    pub fn exporter(&self) -> &NfsExporter<R> {
        &self.exporter
    }

    /// Runs `method` with JSON `params`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        debug!(method, "rpc call");
        match method {
            "nfs_export_list" => {
                let exports = self.blocking(|e| e.exports()).await?;
                let entries: Vec<ExportEntry> = exports.iter().map(ExportEntry::from).collect();
                serde_json::to_value(entries).map_err(|e| RpcError {
                    code: INTERNAL_ERROR,
                    message: e.to_string(),
                })
            }
            "nfs_export_add" => {
                let p: ExportAddParams = parse_params(params)?;
                let flags = ExportFlags::from_bits(p.options)?;
                let key_values = validate_key_values(Some(&stringify_values(&p.key_value_options)?))?;
                self.blocking(move |e| e.export_add(&p.host, &p.path, flags, key_values))
                    .await?;
                Ok(Value::Null)
            }
            "nfs_export_remove" => {
                let p: ExportRemoveParams = parse_params(params)?;
                let export = Export::new(&p.host, &p.path, ExportOptions::empty());
                self.blocking(move |e| e.export_remove(&export)).await?;
                Ok(Value::Null)
            }
            "nfs_export_resync" => {
                self.blocking(|e| e.resync()).await?;
                Ok(Value::Null)
            }
            "nfs_export_auth_list" => Ok(Value::from(security_options().to_vec())),
            _ => Err(RpcError {
                code: METHOD_NOT_FOUND,
                message: format!("method {} not found", method),
            }),
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, RpcError>
    where
        T: Send + 'static,
        F: FnOnce(&NfsExporter<R>) -> crate::error::Result<T> + Send + 'static,
    {
        let exporter = Arc::clone(&self.exporter);
        tokio::task::spawn_blocking(move || f(&exporter))
            .await
            .map_err(|e| RpcError {
                code: INTERNAL_ERROR,
                message: format!("exporter task failed: {}", e),
            })?
            .map_err(RpcError::from)
    }
}
