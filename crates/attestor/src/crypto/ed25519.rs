//! Ed25519 sign/verify with runtime provider fallback.
//!
//! The native provider (ring) is tried first; when it cannot import the key
//! form (it only takes 32-byte seeds) or otherwise fails, the software
//! provider (dalek) takes over. Selection happens per call by probing, so a
//! host with a working native path never pays for the fallback.

use thiserror::Error;
use tracing::debug;

pub const SEED_LEN: usize = 32;
pub const EXPANDED_LEN: usize = 64;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum Ed25519Error {
    #[error("invalid ed25519 private key length {0}, expected 32 or 64 bytes")]
    PrivateKeyLength(usize),
    #[error("invalid ed25519 public key length {0}, expected 32 bytes")]
    PublicKeyLength(usize),
    #[error("invalid ed25519 signature length {0}, expected 64 bytes")]
    SignatureLength(usize),
    #[error("{provider}: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
}

/// One sign/verify capability. Providers may reject key forms they cannot
/// import; the backend treats that as a cue to probe the next one.
trait Ed25519Provider: Send + Sync {
    fn name(&self) -> &'static str;
    fn sign(&self, secret: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_LEN], Ed25519Error>;
    fn verify(
        &self,
        public: &[u8; PUBLIC_KEY_LEN],
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
    ) -> Result<bool, Ed25519Error>;
}

struct RingProvider;

impl Ed25519Provider for RingProvider {
    fn name(&self) -> &'static str {
        "ring"
    }

    fn sign(&self, secret: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_LEN], Ed25519Error> {
        if secret.len() != SEED_LEN {
            return Err(Ed25519Error::Provider {
                provider: "ring",
                message: "expanded secret keys not importable".to_string(),
            });
        }
        let keypair =
            ring::signature::Ed25519KeyPair::from_seed_unchecked(secret).map_err(|e| {
                Ed25519Error::Provider {
                    provider: "ring",
                    message: e.to_string(),
                }
            })?;
        let sig = keypair.sign(message);
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(sig.as_ref());
        Ok(out)
    }

    fn verify(
        &self,
        public: &[u8; PUBLIC_KEY_LEN],
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
    ) -> Result<bool, Ed25519Error> {
        let key = ring::signature::UnparsedPublicKey::new(&ring::signature::ED25519, public);
        Ok(key.verify(message, signature).is_ok())
    }
}

struct DalekProvider;

impl Ed25519Provider for DalekProvider {
    fn name(&self) -> &'static str {
        "dalek"
    }

    fn sign(&self, secret: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_LEN], Ed25519Error> {
        use ed25519_dalek::Signer;
        let signing_key = match secret.len() {
            SEED_LEN => {
                let mut seed = [0u8; SEED_LEN];
                seed.copy_from_slice(secret);
                ed25519_dalek::SigningKey::from_bytes(&seed)
            }
            EXPANDED_LEN => {
                let mut pair = [0u8; EXPANDED_LEN];
                pair.copy_from_slice(secret);
                ed25519_dalek::SigningKey::from_keypair_bytes(&pair).map_err(|e| {
                    Ed25519Error::Provider {
                        provider: "dalek",
                        message: e.to_string(),
                    }
                })?
            }
            other => return Err(Ed25519Error::PrivateKeyLength(other)),
        };
        Ok(signing_key.sign(message).to_bytes())
    }

    fn verify(
        &self,
        public: &[u8; PUBLIC_KEY_LEN],
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
    ) -> Result<bool, Ed25519Error> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(public).map_err(|e| {
            Ed25519Error::Provider {
                provider: "dalek",
                message: e.to_string(),
            }
        })?;
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        Ok(key.verify_strict(message, &sig).is_ok())
    }
}

/// Probing backend over the available providers, native first.
pub struct SignatureBackend {
    providers: Vec<Box<dyn Ed25519Provider>>,
}

impl Default for SignatureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureBackend {
    pub fn new() -> Self {
        Self {
            providers: vec![Box::new(RingProvider), Box::new(DalekProvider)],
        }
    }

    /// Sign `message` with a 32-byte seed or 64-byte expanded secret key.
    pub fn sign(&self, secret: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_LEN], Ed25519Error> {
        if secret.len() != SEED_LEN && secret.len() != EXPANDED_LEN {
            return Err(Ed25519Error::PrivateKeyLength(secret.len()));
        }
        let mut last: Option<Ed25519Error> = None;
        for provider in &self.providers {
            match provider.sign(secret, message) {
                Ok(sig) => {
                    if last.is_some() {
                        debug!(provider = provider.name(), "signed after provider fallback");
                    }
                    return Ok(sig);
                }
                Err(e) => {
                    debug!(provider = provider.name(), error = %e, "sign unavailable, probing next");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or(Ed25519Error::Provider {
            provider: "none",
            message: "no provider available".to_string(),
        }))
    }

    /// Verify a detached signature. `Ok(false)` means a well-formed but wrong
    /// signature; `Err` means the inputs were malformed.
    pub fn verify(
        &self,
        public: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, Ed25519Error> {
        let public: [u8; PUBLIC_KEY_LEN] = public
            .try_into()
            .map_err(|_| Ed25519Error::PublicKeyLength(public.len()))?;
        let signature: [u8; SIGNATURE_LEN] = signature
            .try_into()
            .map_err(|_| Ed25519Error::SignatureLength(signature.len()))?;
        let mut last: Option<Ed25519Error> = None;
        for provider in &self.providers {
            match provider.verify(&public, message, &signature) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    debug!(
                        provider = provider.name(),
                        key = %masked(&public),
                        error = %e,
                        "verify unavailable, probing next"
                    );
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or(Ed25519Error::Provider {
            provider: "none",
            message: "no provider available".to_string(),
        }))
    }
}

/// Normalize a secret to the expanded 64-byte `seed || public` form the
/// software path expects. 64-byte inputs pass through unchanged.
pub fn normalize_secret_key(secret: &[u8]) -> Result<[u8; EXPANDED_LEN], Ed25519Error> {
    match secret.len() {
        EXPANDED_LEN => {
            let mut out = [0u8; EXPANDED_LEN];
            out.copy_from_slice(secret);
            Ok(out)
        }
        SEED_LEN => {
            let mut seed = [0u8; SEED_LEN];
            seed.copy_from_slice(secret);
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
            Ok(signing_key.to_keypair_bytes())
        }
        other => Err(Ed25519Error::PrivateKeyLength(other)),
    }
}

/// First and last two bytes in hex; key material never appears whole in logs.
pub fn masked(bytes: &[u8]) -> String {
    let h = hex::encode(bytes);
    if h.len() <= 8 {
        return h;
    }
    format!("{}..{}", &h[..4], &h[h.len() - 4..])
}
