// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use anyhow::Context as _;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::Jwt;
use crate::JwsSigner;
use crate::Result;
use crate::SdJwt;

pub const KB_JWT_HEADER_TYP: &str = "kb+jwt";

/// The holder key material advertised by the issuer under the `cnf` claim,
/// per [RFC 7800](https://www.rfc-editor.org/rfc/rfc7800.html#section-3).
///
/// The key binding JWT of a presentation must be secured by the key this
/// claim identifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredKeyBinding {
  /// Holder public key embedded as a JWK.
  Jwk(JsonObject),
  /// Reference to a key the verifier resolves out of band.
  Kid(String),
}

/// Claims set for key binding JWT.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyBindingJwtClaims {
  pub iat: i64,
  pub aud: String,
  pub nonce: String,
  pub sd_hash: String,
  #[serde(flatten)]
  pub properties: JsonObject,
}

/// A compact JWS binding a presentation to a verifier challenge, with
/// `typ = "kb+jwt"` enforced structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindingJwt(Jwt<KeyBindingJwtClaims>);

impl KeyBindingJwt {
  pub fn claims(&self) -> &KeyBindingJwtClaims {
    &self.0.claims
  }

  pub fn header(&self) -> &JsonObject {
    &self.0.header
  }

  pub(crate) fn jwt(&self) -> &Jwt<KeyBindingJwtClaims> {
    &self.0
  }
}

impl Display for KeyBindingJwt {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.0.as_str())
  }
}

impl FromStr for KeyBindingJwt {
  type Err = Error;
  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    let jwt: Jwt<KeyBindingJwtClaims> = s.parse()?;
    if jwt.typ() != Some(KB_JWT_HEADER_TYP) {
      return Err(Error::MalformedJws(format!(
        "key binding JWT requires typ {KB_JWT_HEADER_TYP:?}"
      )));
    }
    let alg = jwt
      .alg()
      .ok_or_else(|| Error::MalformedJws("key binding JWT is missing the `alg` header".to_string()))?;
    if alg.eq_ignore_ascii_case("none") {
      return Err(Error::AlgorithmNotAllowed(alg.to_owned()));
    }
    Ok(Self(jwt))
  }
}

/// Builds the key binding JWT of one presentation.
///
/// `sd_hash` commits to the exact bytes being presented: the digest, under
/// the credential's `_sd_alg`, of `<issuer JWS>~<selected disclosures each
/// followed by '~'>` including the trailing delimiter.
#[derive(Debug, Clone)]
pub struct KeyBindingJwtBuilder {
  aud: String,
  nonce: String,
  iat: Option<i64>,
  properties: JsonObject,
}

impl KeyBindingJwtBuilder {
  /// Creates a builder for a KB-JWT addressed to `aud`, answering `nonce`.
  pub fn new(aud: impl Into<String>, nonce: impl Into<String>) -> Self {
    Self {
      aud: aud.into(),
      nonce: nonce.into(),
      iat: None,
      properties: JsonObject::new(),
    }
  }

  /// Overrides the issuance instant. Defaults to the current time.
  pub fn iat(mut self, iat: i64) -> Self {
    self.iat = Some(iat);
    self
  }

  /// Adds an extra payload property.
  pub fn insert_property(mut self, key: impl Into<String>, value: Value) -> Self {
    self.properties.insert(key.into(), value);
    self
  }

  /// Computes `sd_hash` over `sd_jwt`'s presented prefix and signs the KB-JWT.
  ///
  /// `sd_jwt` must already hold exactly the disclosures being presented.
  pub async fn finish<S: JwsSigner>(
    self,
    sd_jwt: &SdJwt,
    hasher: &dyn Hasher,
    alg: &str,
    signer: &S,
  ) -> Result<KeyBindingJwt> {
    if alg.is_empty() || alg.eq_ignore_ascii_case("none") {
      return Err(Error::AlgorithmNotAllowed(alg.to_owned()));
    }

    let claims = KeyBindingJwtClaims {
      iat: self.iat.unwrap_or_else(|| Utc::now().timestamp()),
      aud: self.aud,
      nonce: self.nonce,
      sd_hash: hasher.encoded_digest(&sd_jwt.sd_hash_input()),
      properties: self.properties,
    };

    let Value::Object(header) = json!({
      "typ": KB_JWT_HEADER_TYP,
      "alg": alg,
    }) else {
      unreachable!();
    };
    let payload = serde_json::to_value(&claims)
      .ok()
      .and_then(|value| value.as_object().cloned())
      .ok_or_else(|| Error::DeserializationError("invalid key binding claims".to_string()))?;

    let compact = signer
      .sign(&header, &payload)
      .await
      .map_err(|e| anyhow::anyhow!("jws failed: {e}"))
      .and_then(|jws_bytes| String::from_utf8(jws_bytes).context("invalid JWS"))
      .map_err(|e| Error::JwsSignerFailure(e.to_string()))?;

    compact.parse()
  }
}
