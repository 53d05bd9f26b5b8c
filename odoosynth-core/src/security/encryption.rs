//! Credential sealing with AES-GCM-256 and Argon2id key derivation.
//!
//! Stored connections never hold a plaintext API key. The key is sealed
//! under a master passphrase and only unsealed into a zeroizing
//! [`Credential`] for the lifetime of a session.
//!
//! # Cryptographic Standards
//! - AES-GCM: NIST SP 800-38D, 96-bit random nonce, 128-bit tag
//! - Argon2id: RFC 9106, 64 MiB memory, 3 passes, 4 lanes

use super::{Connection, Credential};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, rand_core::RngCore},
};
use argon2::{
    Argon2, Params, Version,
    password_hash::{PasswordHasher, SaltString},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Algorithm label written into every sealed secret.
pub const ALGORITHM: &str = "AES-GCM-256";

const AES_GCM_NONCE_SIZE: usize = 12;
const AES_GCM_TAG_SIZE: usize = 16;
const AES_KEY_SIZE: usize = 32;
const ARGON2_SALT_SIZE: usize = 16;
const ARGON2_MEMORY_COST: u32 = 65536;
const ARGON2_TIME_COST: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

/// Argon2id parameters embedded next to the ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Random salt, base64
    pub salt: String,
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl KdfParams {
    /// Creates parameters with a fresh random salt.
    pub fn new() -> Self {
        let mut salt = [0u8; ARGON2_SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        Self {
            salt: STANDARD.encode(salt),
            memory_cost: ARGON2_MEMORY_COST,
            time_cost: ARGON2_TIME_COST,
            parallelism: ARGON2_PARALLELISM,
        }
    }

    /// Validates that parameters meet the minimum cost.
    ///
    /// # Errors
    /// Returns error if the salt is short or any cost is below the minimum
    pub fn validate(&self) -> crate::Result<()> {
        let salt = decode_field("salt", &self.salt)?;
        if salt.len() < ARGON2_SALT_SIZE {
            return Err(crate::error::OdooSynthError::credential(format!(
                "Salt must be at least {} bytes",
                ARGON2_SALT_SIZE
            )));
        }
        if self.memory_cost < ARGON2_MEMORY_COST {
            return Err(crate::error::OdooSynthError::credential(format!(
                "Memory cost must be at least {} KiB",
                ARGON2_MEMORY_COST
            )));
        }
        if self.time_cost < ARGON2_TIME_COST {
            return Err(crate::error::OdooSynthError::credential(format!(
                "Time cost must be at least {} iterations",
                ARGON2_TIME_COST
            )));
        }
        if self.parallelism < 1 {
            return Err(crate::error::OdooSynthError::credential(
                "Parallelism must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new()
    }
}

/// A secret sealed under a master passphrase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedSecret {
    /// Always [`ALGORITHM`]
    pub algorithm: String,
    /// 96-bit nonce, base64
    pub nonce: String,
    /// Ciphertext without the tag, base64
    pub ciphertext: String,
    /// 128-bit authentication tag, base64
    pub auth_tag: String,
    /// Key derivation parameters
    pub kdf_params: KdfParams,
}

/// A connection whose credential is sealed; safe to write to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedConnection {
    /// Endpoint URL without credentials
    pub endpoint: String,
    /// Odoo database name
    pub database: String,
    /// Login of the principal
    pub login: String,
    /// Sealed API key
    pub credential: SealedSecret,
}

impl SealedConnection {
    /// Seals the credential of `connection`.
    ///
    /// # Errors
    /// Returns error if key derivation or encryption fails
    pub fn seal(connection: &Connection, passphrase: &str) -> crate::Result<Self> {
        Ok(Self {
            endpoint: connection.endpoint().to_string(),
            database: connection.database().to_string(),
            login: connection.login().to_string(),
            credential: seal_credential(connection.credential(), passphrase)?,
        })
    }

    /// Unseals into a session-ready connection.
    ///
    /// # Errors
    /// Returns error if the passphrase is wrong, the data was tampered with,
    /// or the stored endpoint is invalid
    pub fn unseal(&self, passphrase: &str) -> crate::Result<Connection> {
        let credential = unseal_credential(&self.credential, passphrase)?;
        Connection::new(&self.endpoint, &self.database, &self.login, credential)
    }
}

fn decode_field(name: &str, value: &str) -> crate::Result<Vec<u8>> {
    STANDARD.decode(value).map_err(|e| {
        crate::error::OdooSynthError::credential(format!("Invalid base64 in {}: {}", name, e))
    })
}

fn derive_key(passphrase: &str, kdf_params: &KdfParams) -> crate::Result<Zeroizing<[u8; 32]>> {
    kdf_params.validate()?;

    let params = Params::new(
        kdf_params.memory_cost,
        kdf_params.time_cost,
        kdf_params.parallelism,
        Some(AES_KEY_SIZE),
    )
    .map_err(|e| {
        crate::error::OdooSynthError::credential(format!("Invalid Argon2 parameters: {}", e))
    })?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let salt = decode_field("salt", &kdf_params.salt)?;
    let salt_string = SaltString::encode_b64(&salt)
        .map_err(|e| crate::error::OdooSynthError::credential(format!("Invalid salt: {}", e)))?;

    let password_hash = argon2
        .hash_password(passphrase.as_bytes(), &salt_string)
        .map_err(|e| {
            crate::error::OdooSynthError::credential(format!("Key derivation failed: {}", e))
        })?;

    let hash_bytes = password_hash.hash.ok_or_else(|| {
        crate::error::OdooSynthError::credential("Key derivation produced no output")
    })?;

    if hash_bytes.as_bytes().len() != AES_KEY_SIZE {
        return Err(crate::error::OdooSynthError::credential(format!(
            "Key derivation produced incorrect key length: expected {}, got {}",
            AES_KEY_SIZE,
            hash_bytes.as_bytes().len()
        )));
    }

    let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
    key.copy_from_slice(hash_bytes.as_bytes());

    Ok(key)
}

/// Seals a credential under `passphrase`.
///
/// A fresh salt and nonce are drawn for every call, so sealing the same key
/// twice never yields the same ciphertext.
///
/// # Errors
/// Returns error if the passphrase is empty or encryption fails
pub fn seal_credential(credential: &Credential, passphrase: &str) -> crate::Result<SealedSecret> {
    if passphrase.is_empty() {
        return Err(crate::error::OdooSynthError::credential(
            "Master passphrase cannot be empty",
        ));
    }

    let kdf_params = KdfParams::new();
    let key = derive_key(passphrase, &kdf_params)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(&nonce, credential.expose().as_bytes())
        .map_err(|e| crate::error::OdooSynthError::credential(format!("Sealing failed: {}", e)))?;

    // AES-GCM appends the tag to the ciphertext
    let split_at = sealed.len().checked_sub(AES_GCM_TAG_SIZE).ok_or_else(|| {
        crate::error::OdooSynthError::credential("Sealed output shorter than the auth tag")
    })?;
    let (payload, auth_tag) = sealed.split_at(split_at);

    Ok(SealedSecret {
        algorithm: ALGORITHM.to_string(),
        nonce: STANDARD.encode(nonce),
        ciphertext: STANDARD.encode(payload),
        auth_tag: STANDARD.encode(auth_tag),
        kdf_params,
    })
}

/// Unseals a credential.
///
/// # Errors
/// Returns error if the algorithm is unknown, the nonce or tag has the wrong
/// length, the passphrase is wrong, or the data was tampered with
pub fn unseal_credential(sealed: &SealedSecret, passphrase: &str) -> crate::Result<Credential> {
    if sealed.algorithm != ALGORITHM {
        return Err(crate::error::OdooSynthError::credential(format!(
            "Unsupported sealing algorithm: {}",
            sealed.algorithm
        )));
    }

    let nonce = decode_field("nonce", &sealed.nonce)?;
    if nonce.len() != AES_GCM_NONCE_SIZE {
        return Err(crate::error::OdooSynthError::credential(format!(
            "Invalid nonce length: expected {}, got {}",
            AES_GCM_NONCE_SIZE,
            nonce.len()
        )));
    }

    let auth_tag = decode_field("auth_tag", &sealed.auth_tag)?;
    if auth_tag.len() != AES_GCM_TAG_SIZE {
        return Err(crate::error::OdooSynthError::credential(format!(
            "Invalid authentication tag length: expected {}, got {}",
            AES_GCM_TAG_SIZE,
            auth_tag.len()
        )));
    }

    let mut full_ciphertext = decode_field("ciphertext", &sealed.ciphertext)?;
    full_ciphertext.extend_from_slice(&auth_tag);

    let key = derive_key(passphrase, &sealed.kdf_params)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce), full_ciphertext.as_slice())
            .map_err(|_| {
                crate::error::OdooSynthError::credential(
                    "Unsealing failed (wrong passphrase or corrupted data)",
                )
            })?,
    );

    let secret = String::from_utf8(plaintext.to_vec()).map_err(|_| {
        crate::error::OdooSynthError::credential("Unsealed credential is not valid UTF-8")
    })?;

    Ok(Credential::new(secret))
}
