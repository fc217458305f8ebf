//! Data-source references and their request envelopes.

use serde::{Deserialize, Serialize};

use crate::template::Expr;
use crate::template::literal::quote;

/// Request version understood by function and HTTP sources.
const INVOKE_VERSION: &str = "2018-05-29";

/// Opaque reference to the system a stage invokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// No-op source; echoes its payload.
    None,
    /// Serverless function.
    Lambda {
        /// Data-source name.
        name: String,
    },
    /// HTTP endpoint.
    Http {
        /// Data-source name.
        name: String,
        /// HTTP method.
        #[serde(default = "default_method")]
        method: String,
        /// Resource path.
        #[serde(default = "default_path")]
        path: String,
    },
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

impl DataSource {
    /// Provisioning name of the source.
    pub fn name(&self) -> &str {
        match self {
            DataSource::None => "NONE",
            DataSource::Lambda { name } | DataSource::Http { name, .. } => name,
        }
    }

    /// Wrap `payload` (JSON text) in this source's request document.
    ///
    /// `none_version` is the request version used by the no-op source.
    pub fn request_envelope(&self, payload: Expr, none_version: &str) -> Expr {
        match self {
            DataSource::None => Expr::concat([
                Expr::text(format!(
                    "{{\"version\": {}, \"payload\": ",
                    quote(none_version)
                )),
                payload,
                Expr::text("}"),
            ]),
            DataSource::Lambda { .. } => Expr::concat([
                Expr::text(format!(
                    "{{\"version\": {}, \"operation\": \"Invoke\", \"payload\": ",
                    quote(INVOKE_VERSION)
                )),
                payload,
                Expr::text("}"),
            ]),
            DataSource::Http { method, path, .. } => Expr::concat([
                Expr::text(format!(
                    "{{\"version\": {}, \"method\": {}, \"resourcePath\": {}, \"params\": {{\"body\": ",
                    quote(INVOKE_VERSION),
                    quote(method),
                    quote(path)
                )),
                payload,
                Expr::text("}}"),
            ]),
        }
    }
}
