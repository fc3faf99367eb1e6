//! Order request signatures.
//!
//! A merchant signs an order request by
//! 1. taking every request parameter except the signature itself,
//! 2. sorting them by key,
//! 3. joining them as `key=value` pairs separated by `|`,
//! 4. appending `|` and the project's secret key, and
//! 5. hashing the result with SHA-256.
//!
//! The signature is transmitted as the hex encoding of the 32-byte digest. Either letter case is accepted. Verification
//! decodes the supplied hex and compares the raw digest bytes.
use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// The request parameter that carries the signature. It is never part of the signed payload.
pub const SIGNATURE_FIELD: &str = "PP_SIGNATURE";

const GLUE: &str = "|";

/// The exact string that is hashed for the given parameters and secret.
pub fn signature_payload(params: &BTreeMap<String, String>, secret: &str) -> String {
    let mut payload = params
        .iter()
        .filter(|(k, _)| k.as_str() != SIGNATURE_FIELD)
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<String>>()
        .join(GLUE);
    payload.push_str(GLUE);
    payload.push_str(secret);
    payload
}

fn digest(params: &BTreeMap<String, String>, secret: &str) -> Vec<u8> {
    Sha256::digest(signature_payload(params, secret).as_bytes()).to_vec()
}

/// The lowercase hex signature for the given parameters and secret.
pub fn compute_signature(params: &BTreeMap<String, String>, secret: &str) -> String {
    hex::encode(digest(params, secret))
}

/// Checks a supplied hex signature. Malformed hex is simply an invalid signature.
pub fn verify_signature(params: &BTreeMap<String, String>, secret: &str, supplied: &str) -> bool {
    match hex::decode(supplied.trim()) {
        Ok(bytes) => bytes == digest(params, secret),
        Err(_) => false,
    }
}
