//! Last.fm request signing.
//!
//! `api_sig` is the MD5 of every parameter as `<name><value>`, ordered by
//! name, followed by the shared secret. `format` and `callback` are never
//! signed.

use std::collections::BTreeMap;

use md5::{Digest, Md5};

/// Parameters of one API call, kept ordered by name.
pub type Params = BTreeMap<&'static str, String>;

/// Compute `api_sig` for `params`.
pub fn api_signature(params: &Params, secret: &str) -> String {
    let mut hasher = Md5::new();
    for (name, value) in params {
        if matches!(*name, "format" | "callback") {
            continue;
        }
        hasher.update(name.as_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Add `api_sig`, then `format=json`.
pub fn sign(mut params: Params, secret: &str) -> Params {
    let signature = api_signature(&params, secret);
    params.insert("api_sig", signature);
    params.insert("format", "json".to_string());
    params
}
