use std::collections::HashMap;

use crate::services::keyring::store::{validate_address, KeyringError};

/// Message types the hot key submits on behalf of the operator. Also the
/// required set checked by the authorization probe.
pub const MSG_VOTE_INBOUND: &str = "/uexecutor.v1.MsgVoteInbound";
pub const MSG_VOTE_OUTBOUND: &str = "/uexecutor.v1.MsgVoteOutbound";
pub const MSG_VOTE_GAS_PRICE: &str = "/uexecutor.v1.MsgVoteGasPrice";
pub const MSG_VOTE_TSS_KEY: &str = "/utss.v1.MsgVoteKey";

pub const AUTHORIZED_MSG_TYPES: [&str; 4] = [
    MSG_VOTE_INBOUND,
    MSG_VOTE_OUTBOUND,
    MSG_VOTE_GAS_PRICE,
    MSG_VOTE_TSS_KEY,
];

/// Granter/grantee pair for one authorized message type. The table exists so
/// a future per-type granter can be introduced without touching call sites.
#[derive(Debug, Clone)]
pub struct MsgSigner {
    msg_type: String,
    granter: String,
    grantee: String,
}

impl MsgSigner {
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// Operator address on whose behalf the message is submitted.
    pub fn granter(&self) -> &str {
        &self.granter
    }

    /// Hot key address that actually signs.
    pub fn grantee(&self) -> &str {
        &self.grantee
    }
}

/// Maps every authorized message-type URL to its delegated signer identity.
pub struct SignerManager {
    signers: HashMap<String, MsgSigner>,
}

impl SignerManager {
    pub fn new(operator_address: &str, hotkey_address: &str) -> Result<Self, KeyringError> {
        validate_address(operator_address)?;
        validate_address(hotkey_address)?;

        let signers = AUTHORIZED_MSG_TYPES
            .iter()
            .map(|msg_type| {
                (
                    msg_type.to_string(),
                    MsgSigner {
                        msg_type: msg_type.to_string(),
                        granter: operator_address.to_string(),
                        grantee: hotkey_address.to_string(),
                    },
                )
            })
            .collect();

        Ok(Self { signers })
    }

    pub fn signer_for(&self, msg_type: &str) -> Result<&MsgSigner, KeyringError> {
        self.signers
            .get(msg_type)
            .ok_or_else(|| KeyringError::NoSignerForMessageType(msg_type.to_string()))
    }

    pub fn msg_types(&self) -> Vec<&str> {
        self.signers.keys().map(|k| k.as_str()).collect()
    }
}
