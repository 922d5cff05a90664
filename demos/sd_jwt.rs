// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::io;

use async_trait::async_trait;
use josekit::jws::JwsHeader;
use josekit::jws::HS256;
use josekit::jwt::JwtPayload;
use josekit::jwt::{self};
use sd_jwt_core::JsonObject;
use sd_jwt_core::JwsSigner;
use sd_jwt_core::JwsVerifier;
use sd_jwt_core::KeyBindingJwtBuilder;
use sd_jwt_core::KeyResolver;
use sd_jwt_core::RequiredKeyBinding;
use sd_jwt_core::SdJwtBuilder;
use sd_jwt_core::SdJwtPresenter;
use sd_jwt_core::SdJwtVerifier;
use sd_jwt_core::VerificationOptions;
use serde_json::json;
use serde_json::Value;

const ISSUER_KEY: &[u8] = b"0123456789ABCDEF0123456789ABCDEF";
const HOLDER_KEY: &[u8] = b"FEDCBA9876543210FEDCBA9876543210";

// Creating JWS backends is outside the scope of this library, josekit is used
// here as an example.
struct HmacSign(Vec<u8>);

#[async_trait]
impl JwsSigner for HmacSign {
  type Error = io::Error;

  async fn sign(&self, header: &JsonObject, payload: &JsonObject) -> Result<Vec<u8>, Self::Error> {
    let to_io = |e: josekit::JoseError| io::Error::new(io::ErrorKind::Other, e.to_string());
    let header = JwsHeader::from_map(header.clone()).map_err(to_io)?;
    let payload = JwtPayload::from_map(payload.clone()).map_err(to_io)?;
    let signer = HS256.signer_from_bytes(&self.0).map_err(to_io)?;
    Ok(jwt::encode_with_signer(&payload, &header, &signer).map_err(to_io)?.into_bytes())
  }
}

struct HmacVerify;

#[async_trait]
impl JwsVerifier for HmacVerify {
  type Error = io::Error;

  async fn verify(&self, _alg: &str, message: &[u8], signature: &[u8], public_key: &Value) -> Result<(), Self::Error> {
    let key = public_key
      .get("jwk")
      .unwrap_or(public_key)
      .get("k")
      .and_then(Value::as_str)
      .and_then(|k| multibase::Base::Base64Url.decode(k).ok())
      .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no oct key material"))?;
    let verifier = HS256
      .verifier_from_bytes(&key)
      .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    josekit::jws::JwsVerifier::verify(&verifier, message, signature)
      .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
  }
}

struct StaticResolver;

#[async_trait]
impl KeyResolver for StaticResolver {
  type Error = io::Error;

  async fn resolve(&self, _header: &JsonObject, _claims: &JsonObject) -> Result<Value, Self::Error> {
    Ok(json!({ "kty": "oct", "k": multibase::Base::Base64Url.encode(ISSUER_KEY) }))
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  let object = json!({
    "iss": "https://issuer.example.com",
    "sub": "user_42",
    "given_name": "John",
    "family_name": "Doe",
    "email": "johndoe@example.com",
    "address": {
      "street_address": "123 Main St",
      "locality": "Anytown",
      "region": "Anystate",
      "country": "US"
    },
    "nationalities": ["US", "DE"]
  });

  let holder_jwk: JsonObject = json!({ "kty": "oct", "k": multibase::Base::Base64Url.encode(HOLDER_KEY) })
    .as_object()
    .cloned()
    .unwrap();

  // Issue: conceal selected claims and sign.
  let sd_jwt = SdJwtBuilder::new(object)?
    .disclosure_directive(serde_json::from_value(json!({
      "given_name": true,
      "family_name": true,
      "email": true,
      "address": { "street_address": true },
      "nationalities": [false, true],
    }))?)
    .add_decoys(4)
    .require_key_binding(RequiredKeyBinding::Jwk(holder_jwk))
    .finish(&HmacSign(ISSUER_KEY.to_vec()), "HS256")
    .await?;
  println!("issued: {}", sd_jwt.presentation());

  // Present: reveal only the email, bind to the verifier's challenge.
  let presentation = SdJwtPresenter::new(sd_jwt)
    .select(|disclosure| disclosure.claim_name.as_deref() == Some("email"))
    .attach_key_binding(
      KeyBindingJwtBuilder::new("https://verifier.example.com", "nonce-1"),
      &HmacSign(HOLDER_KEY.to_vec()),
      "HS256",
    )
    .await?
    .finish()
    .presentation();
  println!("presented: {presentation}");

  // Verify: signature, reconstruction, key binding.
  let verifier = SdJwtVerifier::new(StaticResolver, HmacVerify).with_options(VerificationOptions {
    expected_issuer: Some("https://issuer.example.com".to_owned()),
    expected_audience: Some("https://verifier.example.com".to_owned()),
    expected_nonce: Some("nonce-1".to_owned()),
    ..VerificationOptions::default()
  });
  let verified = verifier.verify(&presentation).await?;
  println!(
    "disclosed claims: {}",
    serde_json::to_string_pretty(&Value::Object(verified.claims))?
  );
  Ok(())
}
