use crate::config::{TargetdConfig, DEFAULT_CONFIG_PATH};
use crate::option_parser::parse_option_string;
use crate::options::OptionValue;
use crate::reconciler::NfsExporter;
use crate::rpc::NfsRpc;
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "targetd-nfs")]
#[command(about = "targetd NFS export management", long_about = None)]
pub struct Cli {
    #[arg(short, long, env = "TARGETD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List active exports
    List,
    /// Export PATH to HOST
    Add {
        host: String,
        path: String,
        /// Option list, e.g. rw,sync,anonuid=1000
        #[arg(short, long)]
        options: Option<String>,
    },
    /// Stop exporting PATH to HOST
    Remove { host: String, path: String },
    /// Rewrite the generated exports file from the active exports
    Resync,
    /// List accepted sec= flavours
    AuthList,
}

impl Command {
    /// RPC method and params this command maps to.
    pub fn method_call(&self) -> Result<(&'static str, Value)> {
        match self {
            Command::List => Ok(("nfs_export_list", Value::Null)),
            Command::Add {
                host,
                path,
                options,
            } => {
                let (flags, key_values) = parse_option_string(options.as_deref().unwrap_or(""))?;
                let key_values: Map<String, Value> = key_values
                    .iter()
                    .map(|(k, v)| {
                        let value = match v {
                            OptionValue::Integer(n) => json!(n),
                            OptionValue::Text(s) => json!(s),
                        };
                        (k.name().to_string(), value)
                    })
                    .collect();
                Ok((
                    "nfs_export_add",
                    json!({
                        "host": host,
                        "path": path,
                        "options": flags.bits(),
                        "key_value_options": key_values,
                    }),
                ))
            }
            Command::Remove { host, path } => Ok((
                "nfs_export_remove",
                json!({ "host": host, "path": path }),
            )),
            Command::Resync => Ok(("nfs_export_resync", Value::Null)),
            Command::AuthList => Ok(("nfs_export_auth_list", Value::Null)),
        }
    }
}

impl Cli {
    pub async fn run(self, config: TargetdConfig) -> Result<()> {
        let rpc = NfsRpc::new(Arc::new(NfsExporter::system(config.nfs)));
        let (method, params) = self.command.method_call()?;

        let result = rpc.call(method, params).await?;
        if !result.is_null() {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Ok(())
    }
}
