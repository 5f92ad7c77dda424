//! In-process executable signing
//!
//! Signs a binary directly, without an external tool: the signing key is
//! read from a passphrase-encrypted credential store, the file content is
//! hashed and signed in memory, and a structured trailer carrying the
//! signature, signer metadata, and an optional timestamp token is appended
//! to the file. Re-signing replaces the previous trailer, so the operation
//! is safe to repeat.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{SecondsFormat, Utc};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, SignError};
use crate::fsutil;
use crate::params::SigningParameters;

use super::SigningBackend;

/// Footer magic closing a signature trailer.
const TRAILER_MAGIC: &[u8; 8] = b"CTRSGN01";

/// Fixed footer size: payload length (u32 LE) plus magic.
const FOOTER_LEN: usize = 4 + TRAILER_MAGIC.len();

/// A named signing key inside the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreEntry {
    /// base64 of the 32-byte ed25519 seed
    key: String,
}

/// Passphrase-encrypted store of named signing keys.
///
/// On disk this is an age-encrypted JSON document; the store passphrase
/// is the only credential needed to open it.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CredentialStore {
    entries: BTreeMap<String, StoreEntry>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh ed25519 key under `alias`, replacing any previous
    /// entry with that name.
    pub fn add_generated_key(&mut self, alias: impl Into<String>) {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        self.add_key(alias, &key.to_bytes());
    }

    /// Store an existing 32-byte ed25519 seed under `alias`.
    pub fn add_key(&mut self, alias: impl Into<String>, seed: &[u8; 32]) {
        self.entries.insert(
            alias.into(),
            StoreEntry {
                key: BASE64.encode(seed),
            },
        );
    }

    /// Names of all stored keys.
    pub fn aliases(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// The signing key stored under `alias`.
    pub fn signing_key(&self, alias: &str) -> Result<SigningKey> {
        let entry = self
            .entries
            .get(alias)
            .ok_or_else(|| SignError::Credentials(format!("no key named '{alias}' in store")))?;
        let bytes = BASE64
            .decode(&entry.key)
            .map_err(|e| SignError::Credentials(format!("corrupt key entry '{alias}': {e}")))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignError::Credentials(format!("corrupt key entry '{alias}'")))?;
        Ok(SigningKey::from_bytes(&seed))
    }

    /// Encrypt and write the store to `path`.
    pub fn save(&self, path: &Path, passphrase: &str) -> Result<()> {
        let plain = serde_json::to_vec(self)?;
        let encryptor = age::Encryptor::with_user_passphrase(age::secrecy::Secret::new(
            passphrase.to_string(),
        ));
        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| SignError::Credentials(format!("cannot encrypt store: {e}")))?;
        writer.write_all(&plain)?;
        writer
            .finish()
            .map_err(|e| SignError::Credentials(format!("cannot encrypt store: {e}")))?;
        std::fs::write(path, encrypted)?;
        Ok(())
    }

    /// Read and decrypt the store at `path`.
    pub fn open(path: &Path, passphrase: &str) -> Result<Self> {
        let encrypted = std::fs::read(path)?;
        let decryptor = match age::Decryptor::new(encrypted.as_slice()) {
            Ok(age::Decryptor::Passphrase(d)) => d,
            Ok(_) => {
                return Err(SignError::Credentials(
                    "store is not passphrase-encrypted".to_string(),
                ))
            }
            Err(e) => return Err(SignError::Credentials(format!("cannot read store: {e}"))),
        };
        let mut reader = decryptor
            .decrypt(
                &age::secrecy::Secret::new(passphrase.to_string()),
                None,
            )
            .map_err(|e| SignError::Credentials(format!("store passphrase rejected: {e}")))?;
        let mut plain = Vec::new();
        reader.read_to_end(&mut plain)?;
        Ok(serde_json::from_slice(&plain)?)
    }
}

/// Signature block appended to a signed binary, serialized as JSON between
/// the original content and the fixed footer.
#[derive(Debug, Serialize, Deserialize)]
struct SignatureTrailer {
    program_name: String,
    program_url: String,
    signed_at: String,
    /// base64 ed25519 public key
    public_key: String,
    /// base64 ed25519 signature over the SHA-256 of the content
    signature: String,
    /// base64 timestamp-authority response, when timestamping is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp_token: Option<String>,
}

/// Length of the original content if `data` ends with a signature trailer.
///
/// The footer alone is not proof: content that merely happens to end with
/// the magic bytes must not be truncated, so the candidate payload has to
/// parse as a trailer too.
fn content_len(data: &[u8]) -> Option<usize> {
    if data.len() < FOOTER_LEN || !data.ends_with(TRAILER_MAGIC) {
        return None;
    }
    let len_at = data.len() - FOOTER_LEN;
    let payload_len =
        u32::from_le_bytes(data[len_at..len_at + 4].try_into().expect("4 bytes")) as usize;
    let start = len_at.checked_sub(payload_len)?;
    serde_json::from_slice::<SignatureTrailer>(&data[start..len_at]).ok()?;
    Some(start)
}

/// Backend that signs files in-process.
pub struct EmbeddedBackend {
    params: SigningParameters,
}

impl EmbeddedBackend {
    pub fn new(params: SigningParameters) -> Self {
        Self { params }
    }

    /// Fetch a timestamp token for `digest` from the configured authority.
    async fn request_timestamp(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let mut builder = reqwest::Client::builder();
        if self.params.use_proxy() && !self.params.proxy_host().is_empty() {
            let proxy_url = if self.params.proxy_port().is_empty() {
                format!("http://{}", self.params.proxy_host())
            } else {
                format!(
                    "http://{}:{}",
                    self.params.proxy_host(),
                    self.params.proxy_port()
                )
            };
            let proxy = reqwest::Proxy::all(&proxy_url)
                .map_err(|e| SignError::Network(format!("invalid proxy {proxy_url}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| SignError::Network(e.to_string()))?;

        let digest_hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        let response = client
            .post(self.params.timestamp_host())
            .header(reqwest::header::CONTENT_TYPE, "application/timestamp-query")
            .body(digest_hex)
            .send()
            .await
            .map_err(|e| SignError::Network(e.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|e| SignError::Network(e.to_string()))?;
        let token = response
            .bytes()
            .await
            .map_err(|e| SignError::Network(e.to_string()))?;
        Ok(token.to_vec())
    }
}

#[async_trait::async_trait]
impl SigningBackend for EmbeddedBackend {
    fn name(&self) -> &str {
        "embedded"
    }

    /// Any regular file can be signed in single-file mode.
    fn matches(&self, _path: &Path) -> bool {
        true
    }

    /// This backend always re-signs; a prior trailer is replaced during
    /// `sign` rather than short-circuiting here.
    async fn is_already_signed(&self, _file: &Path) -> Result<bool> {
        Ok(false)
    }

    async fn sign(&self, file: &Path) -> Result<()> {
        fsutil::ensure_writable(file)?;

        let store = CredentialStore::open(
            Path::new(self.params.key_store()),
            self.params.store_password(),
        )?;
        let key = store.signing_key(self.params.alias())?;

        let data = std::fs::read(file)?;
        let content = match content_len(&data) {
            Some(len) => {
                debug!(file = %file.display(), "replacing existing signature trailer");
                &data[..len]
            }
            None => &data[..],
        };

        let digest = Sha256::digest(content);
        let timestamp_token = if self.params.use_timestamp() {
            Some(self.request_timestamp(&digest).await?)
        } else {
            None
        };

        let signature = key.sign(&digest);
        let trailer = SignatureTrailer {
            program_name: self.params.program_name().to_string(),
            program_url: self.params.program_url().to_string(),
            signed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            public_key: BASE64.encode(key.verifying_key().to_bytes()),
            signature: BASE64.encode(signature.to_bytes()),
            timestamp_token: timestamp_token.map(|t| BASE64.encode(t)),
        };
        let payload = serde_json::to_vec(&trailer)?;

        let mut signed = Vec::with_capacity(content.len() + payload.len() + FOOTER_LEN);
        signed.extend_from_slice(content);
        signed.extend_from_slice(&payload);
        signed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        signed.extend_from_slice(TRAILER_MAGIC);
        std::fs::write(file, signed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SignMethod;
    use ed25519_dalek::Verifier;
    use tempfile::TempDir;

    fn read_trailer(data: &[u8]) -> Option<(Vec<u8>, SignatureTrailer)> {
        let content_len = content_len(data)?;
        let payload = &data[content_len..data.len() - FOOTER_LEN];
        let trailer = serde_json::from_slice(payload).ok()?;
        Some((data[..content_len].to_vec(), trailer))
    }

    fn store_on_disk(dir: &Path, passphrase: &str) -> std::path::PathBuf {
        let path = dir.join("release.csks");
        let mut store = CredentialStore::new();
        store.add_generated_key("release");
        store.save(&path, passphrase).unwrap();
        path
    }

    fn params_for(store: &Path) -> SigningParameters {
        SigningParameters::builder()
            .method(SignMethod::Embedded)
            .key_store(store.display().to_string())
            .store_password("hunter2")
            .alias("release")
            .program_name("Demo App")
            .program_url("https://example.com/demo")
            .use_timestamp(false)
            .build()
    }

    #[test]
    fn test_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = store_on_disk(temp.path(), "hunter2");

        let store = CredentialStore::open(&path, "hunter2").unwrap();
        assert_eq!(store.aliases(), vec!["release"]);
        store.signing_key("release").unwrap();
    }

    #[test]
    fn test_wrong_passphrase_is_a_credential_error() {
        let temp = TempDir::new().unwrap();
        let path = store_on_disk(temp.path(), "hunter2");

        match CredentialStore::open(&path, "wrong") {
            Err(SignError::Credentials(_)) => {}
            other => panic!("expected credential error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_alias_is_a_credential_error() {
        let mut store = CredentialStore::new();
        store.add_generated_key("release");
        match store.signing_key("debug") {
            Err(SignError::Credentials(msg)) => assert!(msg.contains("debug")),
            other => panic!("expected credential error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_appends_verifiable_trailer() {
        let temp = TempDir::new().unwrap();
        let store_path = store_on_disk(temp.path(), "hunter2");
        let target = temp.path().join("app.exe");
        std::fs::write(&target, b"machine code").unwrap();

        let backend = EmbeddedBackend::new(params_for(&store_path));
        backend.sign(&target).await.unwrap();

        let data = std::fs::read(&target).unwrap();
        let (content, trailer) = read_trailer(&data).expect("trailer present");
        assert_eq!(content, b"machine code");
        assert_eq!(trailer.program_name, "Demo App");
        assert_eq!(trailer.program_url, "https://example.com/demo");
        assert!(trailer.timestamp_token.is_none());

        let key_bytes: [u8; 32] = BASE64
            .decode(&trailer.public_key)
            .unwrap()
            .try_into()
            .unwrap();
        let sig_bytes: [u8; 64] = BASE64
            .decode(&trailer.signature)
            .unwrap()
            .try_into()
            .unwrap();
        let verifying = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes).unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        let digest = Sha256::digest(&content);
        verifying.verify(&digest, &signature).unwrap();
    }

    #[tokio::test]
    async fn test_resigning_replaces_the_trailer() {
        let temp = TempDir::new().unwrap();
        let store_path = store_on_disk(temp.path(), "hunter2");
        let target = temp.path().join("app.exe");
        std::fs::write(&target, b"machine code").unwrap();

        let backend = EmbeddedBackend::new(params_for(&store_path));
        backend.sign(&target).await.unwrap();
        let first = std::fs::read(&target).unwrap();
        backend.sign(&target).await.unwrap();
        let second = std::fs::read(&target).unwrap();

        // Same content, one trailer, no growth on repeat signing.
        assert_eq!(first.len(), second.len());
        let (content, _) = read_trailer(&second).unwrap();
        assert_eq!(content, b"machine code");
    }

    #[tokio::test]
    async fn test_sign_with_read_only_target() {
        let temp = TempDir::new().unwrap();
        let store_path = store_on_disk(temp.path(), "hunter2");
        let target = temp.path().join("app.exe");
        std::fs::write(&target, b"machine code").unwrap();
        let mut perms = std::fs::metadata(&target).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&target, perms).unwrap();

        let backend = EmbeddedBackend::new(params_for(&store_path));
        backend.sign(&target).await.unwrap();
        assert!(read_trailer(&std::fs::read(&target).unwrap()).is_some());
    }

    #[test]
    fn test_unsigned_data_has_no_content_len() {
        assert!(content_len(b"plain data").is_none());
        assert!(content_len(b"").is_none());
    }

    #[test]
    fn test_coincidental_footer_is_not_a_trailer() {
        // Well-formed footer, but the claimed payload is not a trailer.
        let mut data = b"content../".to_vec();
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(TRAILER_MAGIC);
        assert!(content_len(&data).is_none());
    }

    #[tokio::test]
    async fn test_signing_keeps_content_that_ends_with_the_magic() {
        let temp = TempDir::new().unwrap();
        let store_path = store_on_disk(temp.path(), "hunter2");
        let target = temp.path().join("app.exe");
        let mut original = b"machine code".to_vec();
        original.extend_from_slice(&3u32.to_le_bytes());
        original.extend_from_slice(TRAILER_MAGIC);
        std::fs::write(&target, &original).unwrap();

        let backend = EmbeddedBackend::new(params_for(&store_path));
        backend.sign(&target).await.unwrap();

        let data = std::fs::read(&target).unwrap();
        let (content, _) = read_trailer(&data).expect("trailer present");
        assert_eq!(content, original);
    }
}
