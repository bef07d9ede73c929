#![warn(missing_docs)]

//! targetd NFS subsystem: export option model, exports(5) parsing, exportfs reconciliation

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod export;
pub mod exports_file;
pub mod option_parser;
pub mod options;
pub mod reconciler;
pub mod rpc;

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use config::{NfsConfig, TargetdConfig};
pub use error::{ErrorKind, NfsError, Result};
pub use export::Export;
pub use options::{ExportFlags, ExportOptions, KeyValueOptions, OptionKey, OptionValue};
pub use reconciler::NfsExporter;
pub use rpc::{NfsRpc, RpcError};
