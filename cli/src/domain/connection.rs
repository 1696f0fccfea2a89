//! Connection descriptor: validated, immutable SSH target plus credential.
//!
//! Pure types and validation only. Opening the session lives in
//! `crate::infra::ssh`.

use std::fmt;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clawdeploy_common::{AuthMethod, ConnectionRequest};
use regex::Regex;

use crate::domain::error::DescriptorError;

pub const DEFAULT_SSH_PORT: u16 = 22;

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // compile-time constant pattern
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*\.?$")
        .expect("valid hostname regex")
});

static IPV6_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // compile-time constant pattern
    Regex::new(r"^[0-9A-Fa-f:.]*:[0-9A-Fa-f:.]*(%[A-Za-z0-9]+)?$").expect("valid ipv6 regex")
});

const OPENSSH_MAGIC: &[u8] = b"openssh-key-v1\0";

/// Secret material used to authenticate.
///
/// Exactly one credential exists per descriptor, so the
/// "password xor private key" invariant is carried by the type.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    /// PEM-encoded, unencrypted private key contents.
    PrivateKey(String),
}

impl Credential {
    #[must_use]
    pub fn auth_method(&self) -> AuthMethod {
        match self {
            Self::Password(_) => AuthMethod::Password,
            Self::PrivateKey(_) => AuthMethod::Key,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
        }
    }
}

/// Where and how to open the remote shell session for one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    host: String,
    port: u16,
    user: String,
    credential: Credential,
}

impl ConnectionDescriptor {
    /// Build a descriptor, validating every field.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] naming the first field that is empty or
    /// malformed.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        credential: Credential,
    ) -> Result<Self, DescriptorError> {
        let host = normalize_host(&host.into())?;
        if port == 0 {
            return Err(DescriptorError::InvalidPort);
        }
        let user = user.into().trim().to_string();
        if user.is_empty() {
            return Err(DescriptorError::EmptyUser);
        }
        if user.chars().any(char::is_whitespace) {
            return Err(DescriptorError::InvalidUser(user));
        }
        match &credential {
            Credential::Password(p) if p.is_empty() => return Err(DescriptorError::MissingPassword),
            Credential::PrivateKey(k) => validate_private_key(k)?,
            Credential::Password(_) => {}
        }
        Ok(Self {
            host,
            port,
            user,
            credential,
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    #[must_use]
    pub fn auth_method(&self) -> AuthMethod {
        self.credential.auth_method()
    }

    /// `host:port`, bracketing IPv6 literals.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// `user@host:port`, for display and logs.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.address())
    }
}

impl TryFrom<ConnectionRequest> for ConnectionDescriptor {
    type Error = DescriptorError;

    fn try_from(req: ConnectionRequest) -> Result<Self, Self::Error> {
        let credential = match req.auth_method {
            AuthMethod::Password => Credential::Password(
                req.password
                    .filter(|p| !p.is_empty())
                    .ok_or(DescriptorError::MissingPassword)?,
            ),
            AuthMethod::Key => Credential::PrivateKey(
                req.private_key
                    .filter(|k| !k.trim().is_empty())
                    .ok_or(DescriptorError::MissingPrivateKey)?,
            ),
        };
        Self::new(
            req.host,
            req.port.unwrap_or(DEFAULT_SSH_PORT),
            req.user,
            credential,
        )
    }
}

fn normalize_host(raw: &str) -> Result<String, DescriptorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DescriptorError::EmptyHost);
    }
    let host = trimmed
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(trimmed);
    if HOSTNAME_RE.is_match(host) || IPV6_RE.is_match(host) {
        Ok(host.to_string())
    } else {
        Err(DescriptorError::InvalidHost(raw.to_string()))
    }
}

/// Checks that `key` is a PEM-armoured private key without a passphrase.
///
/// # Errors
///
/// Returns [`DescriptorError::UnparseableKey`] when the armour or body is
/// malformed and [`DescriptorError::EncryptedKey`] when the key is encrypted.
pub fn validate_private_key(key: &str) -> Result<(), DescriptorError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(DescriptorError::MissingPrivateKey);
    }
    let first = key.lines().next().unwrap_or_default().trim();
    let label = first
        .strip_prefix("-----BEGIN ")
        .and_then(|rest| rest.strip_suffix("-----"))
        .ok_or(DescriptorError::UnparseableKey)?;
    if !label.ends_with("PRIVATE KEY") {
        return Err(DescriptorError::UnparseableKey);
    }
    if !key.contains(&format!("-----END {label}-----")) {
        return Err(DescriptorError::UnparseableKey);
    }
    if label == "ENCRYPTED PRIVATE KEY" || key.contains("Proc-Type: 4,ENCRYPTED") {
        return Err(DescriptorError::EncryptedKey);
    }
    if label == "OPENSSH PRIVATE KEY" {
        let cipher = openssh_cipher_name(key)?;
        if cipher != "none" {
            return Err(DescriptorError::EncryptedKey);
        }
    }
    Ok(())
}

/// Reads the cipher name from an `openssh-key-v1` body.
fn openssh_cipher_name(key: &str) -> Result<String, DescriptorError> {
    let body: String = key
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with("-----"))
        .collect();
    let bytes = STANDARD
        .decode(body.as_bytes())
        .map_err(|_| DescriptorError::UnparseableKey)?;
    let rest = bytes
        .strip_prefix(OPENSSH_MAGIC)
        .ok_or(DescriptorError::UnparseableKey)?;
    let len_bytes: [u8; 4] = rest
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(DescriptorError::UnparseableKey)?;
    let end = usize::try_from(u32::from_be_bytes(len_bytes))
        .ok()
        .and_then(|len| 4usize.checked_add(len))
        .ok_or(DescriptorError::UnparseableKey)?;
    let name = rest.get(4..end).ok_or(DescriptorError::UnparseableKey)?;
    Ok(String::from_utf8_lossy(name).into_owned())
}
