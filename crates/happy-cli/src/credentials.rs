// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `credentials.json` under the Happy home directory. The shape present on
//! disk (`legacy` vs `data-key`) selects which crypto profile (A) uses.
//! Mode 0600; never created by this binary, only read.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::datakey::DataKeyCipher;
use crate::crypto::legacy::{LegacyCipher, KEY_LEN};
use crate::crypto::Cipher;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    DataKey { encryption: Encryption, token: String },
    Legacy { secret: String, token: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encryption {
    pub public_key: String,
    pub machine_key: String,
}

impl Credentials {
    /// Load and parse the credentials file. Unlike [`crate::settings::Settings`]
    /// this has no "missing file" default: a session cannot start without
    /// credentials, so a read or parse failure is a fatal startup error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("could not read credentials file {}: {e}", path.display()))?;
        serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("could not parse credentials file {}: {e}", path.display()))
    }

    pub fn token(&self) -> &str {
        match self {
            Credentials::Legacy { token, .. } => token,
            Credentials::DataKey { token, .. } => token,
        }
    }

    /// Build the crypto profile this credentials shape selects.
    pub fn build_cipher(&self) -> anyhow::Result<Cipher> {
        match self {
            Credentials::Legacy { secret, .. } => {
                let bytes = BASE64.decode(secret).map_err(|_| anyhow::anyhow!("malformed legacy secret"))?;
                let key: [u8; KEY_LEN] =
                    bytes.try_into().map_err(|_| anyhow::anyhow!("legacy secret must be {KEY_LEN} bytes"))?;
                Ok(Cipher::Legacy(LegacyCipher::new(&key)?))
            }
            Credentials::DataKey { encryption, .. } => {
                let seed = BASE64
                    .decode(&encryption.machine_key)
                    .map_err(|_| anyhow::anyhow!("malformed machine key"))?;
                Ok(Cipher::DataKey(DataKeyCipher::from_seed(&seed)?))
            }
        }
    }
}

/// Restrict `path` to mode 0600, matching the on-disk requirement.
#[cfg(unix)]
pub fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
