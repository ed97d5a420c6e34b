pub mod signer;
pub mod store;

pub use signer::{MsgSigner, SignerManager, AUTHORIZED_MSG_TYPES};
pub use store::{
    derive_address, key_fingerprint, validate_address, HotKey, Keyring, KeyringBackend,
    KeyringConfig, KeyringError, SecurityLevel, ADDRESS_HRP,
};
