// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! josekit-backed adapters for the signer/verifier/resolver seams, shared by
//! the integration suites. Creating JWS backends is out of the scope of the
//! library; josekit stands in for the host here.

#![allow(dead_code)]

use std::io;

use async_trait::async_trait;
use josekit::jws::JwsHeader;
use josekit::jws::HS256;
use josekit::jwt::JwtPayload;
use josekit::jwt::{self};
use sd_jwt_core::JsonObject;
use sd_jwt_core::JwsSigner;
use sd_jwt_core::JwsVerifier;
use sd_jwt_core::KeyResolver;
use serde_json::json;
use serde_json::Value;

pub const ISSUER_KEY: &[u8] = b"0123456789ABCDEF0123456789ABCDEF";
pub const HOLDER_KEY: &[u8] = b"FEDCBA9876543210FEDCBA9876543210";

fn to_io_error(error: impl ToString) -> io::Error {
  io::Error::new(io::ErrorKind::Other, error.to_string())
}

pub fn oct_jwk(key: &[u8]) -> JsonObject {
  json!({
    "kty": "oct",
    "k": multibase::Base::Base64Url.encode(key),
  })
  .as_object()
  .cloned()
  .unwrap()
}

/// Signs compact JWSs with HS256 over the held secret.
pub struct HmacSign(pub Vec<u8>);

impl HmacSign {
  pub fn issuer() -> Self {
    Self(ISSUER_KEY.to_vec())
  }

  pub fn holder() -> Self {
    Self(HOLDER_KEY.to_vec())
  }
}

#[async_trait]
impl JwsSigner for HmacSign {
  type Error = io::Error;

  async fn sign(&self, header: &JsonObject, payload: &JsonObject) -> Result<Vec<u8>, Self::Error> {
    let header = JwsHeader::from_map(header.clone()).map_err(to_io_error)?;
    let payload = JwtPayload::from_map(payload.clone()).map_err(to_io_error)?;
    let signer = HS256.signer_from_bytes(&self.0).map_err(to_io_error)?;
    let jwt = jwt::encode_with_signer(&payload, &header, &signer).map_err(to_io_error)?;
    Ok(jwt.into_bytes())
  }
}

/// Verifies HS256 signatures with the secret carried by the supplied key
/// material: either a bare oct JWK (issuer resolution) or a `cnf`-style
/// `{"jwk": …}` object (key binding).
pub struct HmacVerify;

#[async_trait]
impl JwsVerifier for HmacVerify {
  type Error = io::Error;

  async fn verify(&self, _alg: &str, message: &[u8], signature: &[u8], public_key: &Value) -> Result<(), Self::Error> {
    let encoded_key = public_key
      .get("jwk")
      .unwrap_or(public_key)
      .get("k")
      .and_then(Value::as_str)
      .ok_or_else(|| to_io_error("no oct key material"))?;
    let key = multibase::Base::Base64Url.decode(encoded_key).map_err(to_io_error)?;
    let verifier = HS256.verifier_from_bytes(&key).map_err(to_io_error)?;
    josekit::jws::JwsVerifier::verify(&verifier, message, signature).map_err(to_io_error)
  }
}

/// Resolves every issuer JWS to the test issuer's key.
pub struct StaticResolver;

#[async_trait]
impl KeyResolver for StaticResolver {
  type Error = io::Error;

  async fn resolve(&self, _header: &JsonObject, _claims: &JsonObject) -> Result<Value, Self::Error> {
    Ok(Value::Object(oct_jwk(ISSUER_KEY)))
  }
}

/// A resolver that knows no keys at all.
pub struct NoKeyResolver;

#[async_trait]
impl KeyResolver for NoKeyResolver {
  type Error = io::Error;

  async fn resolve(&self, _header: &JsonObject, _claims: &JsonObject) -> Result<Value, Self::Error> {
    Err(to_io_error("no key registered for this issuer"))
  }
}

/// Panics when asked to sign; used to prove that validation failures happen
/// before anything reaches the signer.
pub struct PanicSigner;

#[async_trait]
impl JwsSigner for PanicSigner {
  type Error = io::Error;

  async fn sign(&self, _header: &JsonObject, _payload: &JsonObject) -> Result<Vec<u8>, Self::Error> {
    panic!("the signer must not be reached");
  }
}

/// Signs a raw payload object into a compact HS256 JWS, bypassing the
/// builder. For crafting payloads the library would refuse to issue.
pub fn sign_raw(payload: &Value, typ: &str, key: &[u8]) -> String {
  let mut header = JwsHeader::new();
  header.set_token_type(typ);
  let payload = JwtPayload::from_map(payload.as_object().cloned().unwrap()).unwrap();
  let signer = HS256.signer_from_bytes(key).unwrap();
  jwt::encode_with_signer(&payload, &header, &signer).unwrap()
}
