use std::path::{Path, PathBuf};
use std::str::FromStr;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use bech32::{FromBase32, ToBase32, Variant};
use pbkdf2::pbkdf2_hmac;
use ripemd::Ripemd160;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

/// Bech32 human-readable prefix for account addresses.
pub const ADDRESS_HRP: &str = "uc";

const CIPHER_AES_256_GCM: &str = "aes-256-gcm";
const CIPHER_NONE: &str = "none";
const PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("keyring configuration error: {0}")]
    Config(String),
    #[error("keyring io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("key record is malformed: {0}")]
    Malformed(String),
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("key integrity check failed for {name}: stored address {stored}, derived {derived}")]
    IntegrityMismatch {
        name: String,
        stored: String,
        derived: String,
    },
    #[error("invalid passphrase")]
    InvalidPassphrase,
    #[error("security policy violation: {0}")]
    PolicyViolation(String),
    #[error("invalid address {address}: {message}")]
    InvalidAddress { address: String, message: String },
    #[error("no signer for message type {0}")]
    NoSignerForMessageType(String),
}

/// Where key material lives at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyringBackend {
    /// Unencrypted, development only.
    Test,
    /// Encrypted at rest, requires a passphrase.
    File,
}

impl KeyringBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyringBackend::Test => "test",
            KeyringBackend::File => "file",
        }
    }
}

impl FromStr for KeyringBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(KeyringBackend::Test),
            "file" => Ok(KeyringBackend::File),
            other => Err(format!("unsupported keyring backend: {other}")),
        }
    }
}

/// Keyring settings supplied by configuration.
#[derive(Debug, Clone)]
pub struct KeyringConfig {
    pub home_dir: PathBuf,
    pub backend: KeyringBackend,
    pub hotkey_name: String,
    pub hotkey_password: Option<String>,
    pub operator_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityLevel {
    #[default]
    Standard,
    High,
}

impl SecurityLevel {
    fn allows_backend(&self, backend: KeyringBackend) -> bool {
        !(matches!(self, SecurityLevel::High) && backend == KeyringBackend::Test)
    }

    fn allows_export(&self, backend: KeyringBackend) -> bool {
        match self {
            SecurityLevel::Standard => true,
            SecurityLevel::High => backend == KeyringBackend::File,
        }
    }
}

/// Hot key identity as seen by the rest of the client. The private key never
/// leaves the store except through [`Keyring::get_private_key`].
#[derive(Debug, Clone)]
pub struct HotKey {
    pub name: String,
    pub address: String,
    /// Compressed secp256k1 public key.
    pub public_key: Vec<u8>,
}

impl HotKey {
    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.public_key)
    }
}

/// On-disk record, one JSON file per key.
#[derive(Debug, Serialize, Deserialize)]
struct KeyRecord {
    name: String,
    address: String,
    pub_key: String,
    cipher: String,
    salt: String,
    nonce: String,
    priv_data: String,
}

/// Scoped credential store holding the validator's hot key.
pub struct Keyring {
    dir: PathBuf,
    backend: KeyringBackend,
    security: SecurityLevel,
}

impl Keyring {
    /// Open (creating if needed) the keyring directory for the chosen
    /// backend. The directory is created with owner-only permissions.
    pub fn open(
        home_dir: &Path,
        backend: KeyringBackend,
        security: SecurityLevel,
    ) -> Result<Self, KeyringError> {
        if !security.allows_backend(backend) {
            return Err(KeyringError::PolicyViolation(
                "test backend is not permitted at high security level".to_string(),
            ));
        }

        let dir = home_dir.join(format!("keyring-{}", backend.as_str()));
        if !dir.exists() {
            create_private_dir(&dir)?;
            info!(dir = %dir.display(), "created keyring directory");
        }

        Ok(Self {
            dir,
            backend,
            security,
        })
    }

    /// Open the store described by a [`KeyringConfig`]. A file backend
    /// without a passphrase is refused up front.
    pub fn from_config(
        config: &KeyringConfig,
        security: SecurityLevel,
    ) -> Result<Self, KeyringError> {
        if config.backend == KeyringBackend::File
            && config.hotkey_password.as_deref().unwrap_or("").is_empty()
        {
            return Err(KeyringError::Config(
                "file backend requires a passphrase".to_string(),
            ));
        }
        Self::open(&config.home_dir, config.backend, security)
    }

    pub fn backend(&self) -> KeyringBackend {
        self.backend
    }

    /// Generate, persist and return a new hot key.
    pub fn generate_key(
        &self,
        name: &str,
        password: Option<&str>,
    ) -> Result<HotKey, KeyringError> {
        if name.is_empty() {
            return Err(KeyringError::Config("key name cannot be empty".to_string()));
        }
        let password = self.required_password(password)?;

        let secp = Secp256k1::new();
        let secret_key = random_secret_key();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let pub_bytes = public_key.serialize().to_vec();
        let address = derive_address(&pub_bytes)?;

        let record = match self.backend {
            KeyringBackend::Test => KeyRecord {
                name: name.to_string(),
                address: address.clone(),
                pub_key: hex::encode(&pub_bytes),
                cipher: CIPHER_NONE.to_string(),
                salt: String::new(),
                nonce: String::new(),
                priv_data: hex::encode(secret_key.secret_bytes()),
            },
            KeyringBackend::File => {
                let salt: [u8; SALT_LEN] = rand::random();
                let nonce: [u8; NONCE_LEN] = rand::random();
                let ciphertext = encrypt_private_key(
                    &secret_key.secret_bytes(),
                    password.unwrap_or_default(),
                    &salt,
                    &nonce,
                )?;
                KeyRecord {
                    name: name.to_string(),
                    address: address.clone(),
                    pub_key: hex::encode(&pub_bytes),
                    cipher: CIPHER_AES_256_GCM.to_string(),
                    salt: hex::encode(salt),
                    nonce: hex::encode(nonce),
                    priv_data: hex::encode(ciphertext),
                }
            }
        };

        let path = self.record_path(name);
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| KeyringError::Malformed(e.to_string()))?;
        std::fs::write(&path, json)?;
        info!(name, address = %address, "generated hot key");

        Ok(HotKey {
            name: name.to_string(),
            address,
            public_key: pub_bytes,
        })
    }

    /// Load a key and verify its integrity: the address re-derived from the
    /// stored public key must match the stored address.
    pub fn load_key(&self, name: &str) -> Result<HotKey, KeyringError> {
        let record = self.read_record(name)?;
        let pub_bytes = hex::decode(&record.pub_key)
            .map_err(|e| KeyringError::Malformed(format!("public key hex: {e}")))?;
        let derived = derive_address(&pub_bytes)?;
        if derived != record.address {
            return Err(KeyringError::IntegrityMismatch {
                name: name.to_string(),
                stored: record.address,
                derived,
            });
        }
        Ok(HotKey {
            name: record.name,
            address: record.address,
            public_key: pub_bytes,
        })
    }

    /// Explicit private-key export, gated by the security policy.
    pub fn get_private_key(
        &self,
        name: &str,
        password: Option<&str>,
    ) -> Result<SecretKey, KeyringError> {
        if !self.security.allows_export(self.backend) {
            return Err(KeyringError::PolicyViolation(format!(
                "private key export from the {} backend is not permitted at this security level",
                self.backend.as_str()
            )));
        }
        let password = self.required_password(password)?;
        let record = self.read_record(name)?;

        let priv_bytes = match record.cipher.as_str() {
            CIPHER_NONE => hex::decode(&record.priv_data)
                .map_err(|e| KeyringError::Malformed(format!("private key hex: {e}")))?,
            CIPHER_AES_256_GCM => {
                let salt = hex::decode(&record.salt)
                    .map_err(|e| KeyringError::Malformed(format!("salt hex: {e}")))?;
                let nonce = hex::decode(&record.nonce)
                    .map_err(|e| KeyringError::Malformed(format!("nonce hex: {e}")))?;
                let ciphertext = hex::decode(&record.priv_data)
                    .map_err(|e| KeyringError::Malformed(format!("ciphertext hex: {e}")))?;
                decrypt_private_key(
                    &ciphertext,
                    password.unwrap_or_default(),
                    &salt,
                    &nonce,
                )?
            }
            other => {
                return Err(KeyringError::Malformed(format!("unknown cipher: {other}")));
            }
        };

        SecretKey::from_slice(&priv_bytes)
            .map_err(|e| KeyringError::Malformed(format!("private key bytes: {e}")))
    }

    fn required_password<'a>(
        &self,
        password: Option<&'a str>,
    ) -> Result<Option<&'a str>, KeyringError> {
        match self.backend {
            KeyringBackend::Test => Ok(password),
            KeyringBackend::File => match password {
                Some(p) if !p.is_empty() => Ok(Some(p)),
                _ => Err(KeyringError::Config(
                    "file backend requires a passphrase".to_string(),
                )),
            },
        }
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn read_record(&self, name: &str) -> Result<KeyRecord, KeyringError> {
        let path = self.record_path(name);
        if !path.exists() {
            return Err(KeyringError::KeyNotFound(name.to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| KeyringError::Malformed(e.to_string()))
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<(), KeyringError> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<(), KeyringError> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

fn random_secret_key() -> SecretKey {
    loop {
        let bytes: [u8; 32] = rand::random();
        if let Ok(key) = SecretKey::from_slice(&bytes) {
            return key;
        }
    }
}

fn derive_key_material(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

fn encrypt_private_key(
    plaintext: &[u8],
    password: &str,
    salt: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>, KeyringError> {
    let key = derive_key_material(password, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| KeyringError::Malformed("encryption failed".to_string()))
}

fn decrypt_private_key(
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>, KeyringError> {
    if nonce.len() != NONCE_LEN {
        return Err(KeyringError::Malformed("bad nonce length".to_string()));
    }
    let key = derive_key_material(password, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| KeyringError::InvalidPassphrase)
}

/// Account address for a compressed secp256k1 public key:
/// bech32(hrp, ripemd160(sha256(pub_key))).
pub fn derive_address(public_key: &[u8]) -> Result<String, KeyringError> {
    let sha = Sha256::digest(public_key);
    let hash = Ripemd160::digest(sha);
    bech32::encode(ADDRESS_HRP, hash.to_base32(), Variant::Bech32).map_err(|e| {
        KeyringError::Malformed(format!("bech32 encoding: {e}"))
    })
}

/// First 8 bytes of SHA-256 over the public key bytes, hex encoded.
pub fn key_fingerprint(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode(&digest[..8])
}

/// Check that an address is well-formed bech32 under the expected prefix.
pub fn validate_address(address: &str) -> Result<(), KeyringError> {
    let (hrp, data, _variant) =
        bech32::decode(address).map_err(|e| KeyringError::InvalidAddress {
            address: address.to_string(),
            message: e.to_string(),
        })?;
    if hrp != ADDRESS_HRP {
        return Err(KeyringError::InvalidAddress {
            address: address.to_string(),
            message: format!("expected prefix {ADDRESS_HRP}, got {hrp}"),
        });
    }
    Vec::<u8>::from_base32(&data).map_err(|e| KeyringError::InvalidAddress {
        address: address.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}
