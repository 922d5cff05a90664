// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use serde_json::Value;

use crate::b64url_decode;
use crate::b64url_encode;
use crate::Error;
use crate::Hasher;
use crate::Result;
use crate::RESERVED_CLAIM_NAMES;

/// A disclosable value.
/// Both object properties and array elements disclosures are supported.
///
/// See: https://www.rfc-editor.org/rfc/rfc9901.html#name-disclosures
#[derive(Debug, Clone)]
pub struct Disclosure {
  /// The salt value.
  pub salt: String,
  /// The claim name, optional for array elements.
  pub claim_name: Option<String>,
  /// The claim Value which can be of any type.
  pub claim_value: Value,
  /// Base64url encoding of the canonical JSON array form. Computed once at
  /// construction and never recomputed; digests are taken over these exact
  /// bytes.
  encoded: String,
}

impl Disclosure {
  /// Creates a new instance of [`Disclosure`] from its components, computing
  /// the canonical JSON form `[salt, claim_name, claim_value]` (or
  /// `[salt, claim_value]` for array elements) and its encoding eagerly.
  ///
  /// ## Error
  ///
  /// Returns an [`Error::MalformedDisclosure`] if `salt` is empty or
  /// `claim_name` is one of the reserved payload keys.
  pub fn new(salt: String, claim_name: Option<String>, claim_value: Value) -> Result<Self> {
    if salt.is_empty() {
      return Err(Error::MalformedDisclosure("salt must not be empty".to_string()));
    }
    if let Some(name) = claim_name.as_deref() {
      if RESERVED_CLAIM_NAMES.contains(&name) {
        return Err(Error::MalformedDisclosure(format!("{name:?} is a reserved claim name")));
      }
    }

    let mut array = Vec::with_capacity(3);
    array.push(Value::String(salt.clone()));
    if let Some(name) = claim_name.as_deref() {
      array.push(Value::String(name.to_owned()));
    }
    array.push(claim_value.clone());
    let encoded = b64url_encode(Value::Array(array).to_string());

    Ok(Self {
      salt,
      claim_name,
      claim_value,
      encoded,
    })
  }

  /// Parses a base64url encoded disclosure into a [`Disclosure`].
  ///
  /// The input string is retained verbatim as the encoded form, so foreign
  /// encodings (e.g. carrying whitespace between array elements) survive
  /// re-serialization and digest computation byte-exactly.
  ///
  /// ## Error
  ///
  /// Returns an [`Error::MalformedDisclosure`] if input is not a valid disclosure.
  pub fn parse(disclosure: &str) -> Result<Self> {
    let decoded: Vec<Value> = b64url_decode(disclosure)
      .map_err(|_| Error::MalformedDisclosure("not base64url-encoded".to_string()))
      .and_then(|data| {
        serde_json::from_slice(&data)
          .map_err(|_| Error::MalformedDisclosure("decoded content is not a JSON array".to_string()))
      })?;

    let (salt, claim_name, claim_value) = match <[Value; 2]>::try_from(decoded) {
      Ok([salt, claim_value]) => (salt, None, claim_value),
      Err(decoded) => {
        let [salt, claim_name, claim_value] = <[Value; 3]>::try_from(decoded).map_err(|decoded| {
          Error::MalformedDisclosure(format!("array has an invalid length of {}", decoded.len()))
        })?;
        let claim_name = claim_name
          .as_str()
          .ok_or_else(|| Error::MalformedDisclosure("claim name is not a string".to_string()))?
          .to_owned();
        if RESERVED_CLAIM_NAMES.contains(&claim_name.as_str()) {
          return Err(Error::MalformedDisclosure(format!(
            "{claim_name:?} is a reserved claim name"
          )));
        }
        (salt, Some(claim_name), claim_value)
      }
    };

    let salt = salt
      .as_str()
      .filter(|salt| !salt.is_empty())
      .ok_or_else(|| Error::MalformedDisclosure("salt is not a non-empty string".to_string()))?
      .to_owned();

    Ok(Self {
      salt,
      claim_name,
      claim_value,
      encoded: disclosure.to_owned(),
    })
  }

  /// The encoded form over which digests are computed.
  pub fn as_str(&self) -> &str {
    &self.encoded
  }

  /// Returns the base64url-encoded digest of this disclosure under `hasher`.
  pub fn digest(&self, hasher: &dyn Hasher) -> String {
    hasher.encoded_digest(self.as_str())
  }
}

impl Display for Disclosure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.encoded)
  }
}

// Two disclosures are the same disclosure exactly when their encoded forms
// (and therefore their digests) coincide.
impl PartialEq for Disclosure {
  fn eq(&self, other: &Self) -> bool {
    self.encoded == other.encoded
  }
}

impl Eq for Disclosure {}
