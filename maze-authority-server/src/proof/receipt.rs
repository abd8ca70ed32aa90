//! Completion Receipts
//!
//! HMAC-SHA256 signatures over a race completion claim. The signed message
//! is the five claim fields joined by `|` in fixed order:
//! `roomId|playerId|seed|timeMs|pathHash`.
//!
//! Signing never depends on the store. Persistence of the receipt record is
//! attempted afterwards and its failure only costs the receipt id.

use std::fmt;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use crate::store::Store;

type HmacSha256 = Hmac<Sha256>;

/// Separator between signed fields.
const FIELD_SEPARATOR: &str = "|";

/// Errors that can occur while issuing receipts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiptError {
    /// Signing secret is empty
    #[error("receipt secret must not be empty")]
    EmptySecret,
    /// Signing secret rejected by the MAC
    #[error("invalid receipt secret")]
    InvalidKey,
    /// A claim field is missing or empty
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Largest magnitude at which every whole `f64` is exact.
const MAX_SAFE_WHOLE: f64 = 9_007_199_254_740_992.0;

/// Claimed elapsed time in milliseconds, exactly as it is signed.
///
/// Any JSON number is accepted. Whole values sign as integers (`1500.0`
/// signs as `1500`); fractional values sign in shortest round-trip form
/// (`1500.25`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ElapsedMs(Number);

impl ElapsedMs {
    fn normalized(number: Number) -> Self {
        if number.is_f64() {
            if let Some(value) = number.as_f64() {
                if value.fract() == 0.0 && value.abs() < MAX_SAFE_WHOLE {
                    return Self(Number::from(value as i64));
                }
            }
        }
        Self(number)
    }

    /// Fractional or non-integer claims come back as `f64`.
    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(f64::NAN)
    }

    /// Whether the claim is zero, which counts as absent.
    pub fn is_zero(&self) -> bool {
        self.as_f64() == 0.0
    }
}

impl From<u64> for ElapsedMs {
    fn from(ms: u64) -> Self {
        Self(Number::from(ms))
    }
}

impl TryFrom<f64> for ElapsedMs {
    type Error = ReceiptError;

    fn try_from(ms: f64) -> Result<Self, Self::Error> {
        Number::from_f64(ms)
            .map(Self::normalized)
            .ok_or(ReceiptError::MissingField("timeMs"))
    }
}

impl<'de> Deserialize<'de> for ElapsedMs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Number::deserialize(deserializer).map(Self::normalized)
    }
}

impl fmt::Display for ElapsedMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The values a receipt attests to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptClaim {
    /// Room identifier
    pub room_id: String,
    /// Player identifier
    pub player_id: String,
    /// Room seed
    pub seed: String,
    /// Elapsed race time (ms)
    pub time_ms: ElapsedMs,
    /// Path fingerprint
    pub path_hash: String,
}

impl ReceiptClaim {
    /// Reject claims with an empty field or a zero time.
    pub fn validate(&self) -> Result<(), ReceiptError> {
        let fields = [
            ("roomId", self.room_id.is_empty()),
            ("playerId", self.player_id.is_empty()),
            ("seed", self.seed.is_empty()),
            ("timeMs", self.time_ms.is_zero()),
            ("pathHash", self.path_hash.is_empty()),
        ];
        match fields.iter().find(|(_, missing)| *missing) {
            Some((name, _)) => Err(ReceiptError::MissingField(name)),
            None => Ok(()),
        }
    }

    /// Exact bytes covered by the signature.
    pub fn signing_message(&self) -> String {
        let time_ms = self.time_ms.to_string();
        [
            self.room_id.as_str(),
            self.player_id.as_str(),
            self.seed.as_str(),
            time_ms.as_str(),
            self.path_hash.as_str(),
        ]
        .join(FIELD_SEPARATOR)
    }
}

/// A signed claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// What was attested
    #[serde(flatten)]
    pub claim: ReceiptClaim,
    /// Hex HMAC-SHA256 signature
    pub signature: String,
}

/// Result of [`ReceiptIssuer::issue`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedReceipt {
    /// The signed receipt
    pub receipt: Receipt,
    /// Store id, if persistence succeeded
    pub receipt_id: Option<String>,
}

/// Signs completion claims with a shared secret.
#[derive(Clone)]
pub struct ReceiptIssuer {
    mac: HmacSha256,
    store: Store,
}

impl ReceiptIssuer {
    /// Create an issuer keyed with `secret`, persisting into `store`.
    pub fn new(secret: &[u8], store: Store) -> Result<Self, ReceiptError> {
        if secret.is_empty() {
            return Err(ReceiptError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| ReceiptError::InvalidKey)?;
        Ok(Self { mac, store })
    }

    /// Hex signature of `claim`.
    pub fn sign(&self, claim: &ReceiptClaim) -> String {
        let mut mac = self.mac.clone();
        mac.update(claim.signing_message().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Whether `signature` (hex) is valid for `claim`. Constant time.
    pub fn verify(&self, claim: &ReceiptClaim, signature: &str) -> bool {
        let Ok(bytes) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(claim.signing_message().as_bytes());
        mac.verify_slice(&bytes).is_ok()
    }

    /// Sign `claim` and try to persist the receipt.
    ///
    /// The signature is always returned; a store failure is logged and
    /// leaves `receipt_id` empty.
    pub async fn issue(&self, claim: ReceiptClaim) -> IssuedReceipt {
        let signature = self.sign(&claim);
        let receipt = Receipt { claim, signature };

        let receipt_id = match self.store.save_receipt(&receipt).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(
                    room_id = %receipt.claim.room_id,
                    player_id = %receipt.claim.player_id,
                    error = %e,
                    "receipt not persisted"
                );
                None
            }
        };

        IssuedReceipt { receipt, receipt_id }
    }
}

// =============================================================================
// TESTS
// =============================================================================
