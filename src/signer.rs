// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

pub type JsonObject = Map<String, Value>;

/// JSON Web Signature (JWS) Signer.
///
/// The host owns keys and algorithms; the engine only supplies the protected
/// header (including `alg` and `typ`) and the payload claims.
#[async_trait]
pub trait JwsSigner {
  type Error: Error;

  /// Creates a compact JWS over `payload` and returns its bytes. The
  /// algorithm used for signing must be read from the `header.alg` property.
  async fn sign(&self, header: &JsonObject, payload: &JsonObject) -> Result<Vec<u8>, Self::Error>;
}

/// JSON Web Signature (JWS) Verifier.
///
/// `message` is the JWS signing input, `signature` its decoded signature and
/// `public_key` whatever the [`KeyResolver`] (or the credential's `cnf`
/// claim, for key binding) produced. Implementations must compare signature
/// material in constant time.
#[async_trait]
pub trait JwsVerifier {
  type Error: Error;

  async fn verify(&self, alg: &str, message: &[u8], signature: &[u8], public_key: &Value) -> Result<(), Self::Error>;
}

/// Resolves the issuer public key for a JWS that is about to be verified.
///
/// `header` and `claims` are parsed but **not yet trusted**; a resolver must
/// not treat them as authentic until verification succeeded.
#[async_trait]
pub trait KeyResolver {
  type Error: Error;

  async fn resolve(&self, header: &JsonObject, claims: &JsonObject) -> Result<Value, Self::Error>;
}
