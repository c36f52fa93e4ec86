//! Records of scripts that run only once
//!
//! A once-script is identified by its name together with the SHA-256 of its
//! contents. The key format and the record layout are persisted between runs,
//! so they must not change: a different key would make every previously run
//! script run again.

use crate::error::Result;
use crate::lazy::Sha256Sum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State store bucket holding once-script records.
pub const SCRIPT_ONCE_STATE_BUCKET: &str = "scriptOnce";

/// Ledger key for a script: `<name>:<hex sha256 of contents>`.
pub fn script_once_key(name: &str, contents_sha256: &Sha256Sum) -> String {
    format!("{name}:{}", hex::encode(contents_sha256))
}

/// What is stored for a once-script after it ran successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOnceState {
    pub name: String,
    pub executed_at: DateTime<Utc>,
}

impl ScriptOnceState {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(value: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(value)?)
    }
}
