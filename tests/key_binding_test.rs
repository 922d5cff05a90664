// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::*;
use sd_jwt_core::DisclosureDirective;
use sd_jwt_core::Error;
use sd_jwt_core::KeyBindingJwtBuilder;
use sd_jwt_core::RequiredKeyBinding;
use sd_jwt_core::SdJwt;
use sd_jwt_core::SdJwtBuilder;
use sd_jwt_core::SdJwtPresenter;
use sd_jwt_core::SdJwtVerifier;
use sd_jwt_core::VerificationOptions;
use serde_json::json;

const AUDIENCE: &str = "https://verifier.example.com";
const NONCE: &str = "N1";
const NOW: i64 = 1_700_000_000;

fn directive(value: serde_json::Value) -> DisclosureDirective {
  serde_json::from_value(value).unwrap()
}

async fn issue_bound_credential() -> SdJwt {
  SdJwtBuilder::new(json!({
    "iss": "https://i.example",
    "sub": "u1",
    "email": "a@example.com",
  }))
  .unwrap()
  .disclosure_directive(directive(json!({ "email": true })))
  .require_key_binding(RequiredKeyBinding::Jwk(oct_jwk(HOLDER_KEY)))
  .finish(&HmacSign::issuer(), "HS256")
  .await
  .unwrap()
}

async fn present(sd_jwt: SdJwt, iat: i64) -> String {
  SdJwtPresenter::new(sd_jwt)
    .attach_key_binding(
      KeyBindingJwtBuilder::new(AUDIENCE, NONCE).iat(iat),
      &HmacSign::holder(),
      "HS256",
    )
    .await
    .unwrap()
    .finish()
    .presentation()
}

fn kb_verifier(options: VerificationOptions) -> SdJwtVerifier<StaticResolver, HmacVerify> {
  SdJwtVerifier::new(StaticResolver, HmacVerify).with_options(options)
}

fn matching_options() -> VerificationOptions {
  VerificationOptions {
    expected_audience: Some(AUDIENCE.to_owned()),
    expected_nonce: Some(NONCE.to_owned()),
    require_key_binding: true,
    ..VerificationOptions::default()
  }
}

#[tokio::test]
async fn fresh_key_binding_is_accepted() {
  let presentation = present(issue_bound_credential().await, NOW).await;
  let verified = kb_verifier(matching_options()).verify_at(&presentation, NOW).await.unwrap();
  let key_binding = verified.key_binding.unwrap();
  assert_eq!(key_binding.aud, AUDIENCE);
  assert_eq!(key_binding.nonce, NONCE);
  assert_eq!(key_binding.iat, NOW);
  assert_eq!(verified.claims.get("email"), Some(&json!("a@example.com")));
}

#[tokio::test]
async fn key_binding_header_carries_the_kb_typ() {
  let presentation = present(issue_bound_credential().await, NOW).await;
  let parsed = SdJwt::parse(&presentation).unwrap();
  let kb_jwt = parsed.key_binding_jwt().unwrap();
  assert_eq!(kb_jwt.header().get("typ"), Some(&json!("kb+jwt")));
  assert!(kb_jwt.claims().sd_hash.len() > 16);
}

#[tokio::test]
async fn stale_key_binding_is_rejected_one_second_past_the_window() {
  let sd_jwt = issue_bound_credential().await;

  // Exactly at the boundary: accepted.
  let presentation = present(sd_jwt.clone(), NOW - 600).await;
  kb_verifier(matching_options()).verify_at(&presentation, NOW).await.unwrap();

  // One second older: rejected.
  let presentation = present(sd_jwt.clone(), NOW - 601).await;
  let result = kb_verifier(matching_options()).verify_at(&presentation, NOW).await;
  assert!(matches!(result.unwrap_err(), Error::StaleKeyBinding));

  // Far-future `iat` is equally stale.
  let presentation = present(sd_jwt, NOW + 601).await;
  let result = kb_verifier(matching_options()).verify_at(&presentation, NOW).await;
  assert!(matches!(result.unwrap_err(), Error::StaleKeyBinding));
}

#[tokio::test]
async fn replayed_nonce_is_rejected() {
  let presentation = present(issue_bound_credential().await, NOW).await;
  let verifier = kb_verifier(VerificationOptions {
    expected_nonce: Some("N2".to_owned()),
    ..matching_options()
  });
  let result = verifier.verify_at(&presentation, NOW).await;
  assert!(matches!(result.unwrap_err(), Error::NonceMismatch));
}

#[tokio::test]
async fn wrong_audience_is_rejected() {
  let presentation = present(issue_bound_credential().await, NOW).await;
  let verifier = kb_verifier(VerificationOptions {
    expected_audience: Some("https://someone-else.example.com".to_owned()),
    ..matching_options()
  });
  let result = verifier.verify_at(&presentation, NOW).await;
  assert!(matches!(result.unwrap_err(), Error::AudienceMismatch));
}

#[tokio::test]
async fn missing_key_binding_is_rejected_when_required() {
  let sd_jwt = issue_bound_credential().await;
  let result = kb_verifier(matching_options()).verify_at(&sd_jwt.presentation(), NOW).await;
  assert!(matches!(result.unwrap_err(), Error::MissingKeyBinding));
}

#[tokio::test]
async fn sd_hash_commits_to_the_presented_disclosures() {
  let presentation = present(issue_bound_credential().await, NOW).await;

  // Strip the only disclosure out of the presented prefix. The KB-JWT still
  // verifies under the holder key, but its `sd_hash` no longer matches.
  let parsed = SdJwt::parse(&presentation).unwrap();
  let disclosure = parsed.disclosures()[0].as_str().to_owned();
  let stripped = presentation.replace(&format!("{disclosure}~"), "");
  assert_ne!(stripped, presentation);

  let result = kb_verifier(matching_options()).verify_at(&stripped, NOW).await;
  assert!(matches!(result.unwrap_err(), Error::DigestMismatch));
}

#[tokio::test]
async fn key_binding_signed_with_the_wrong_key_is_rejected() {
  let sd_jwt = issue_bound_credential().await;
  let presentation = SdJwtPresenter::new(sd_jwt)
    .attach_key_binding(
      KeyBindingJwtBuilder::new(AUDIENCE, NONCE).iat(NOW),
      // The issuer key is not the key advertised under `cnf`.
      &HmacSign::issuer(),
      "HS256",
    )
    .await
    .unwrap()
    .finish()
    .presentation();

  let result = kb_verifier(matching_options()).verify_at(&presentation, NOW).await;
  assert!(matches!(result.unwrap_err(), Error::SignatureInvalid));
}

#[tokio::test]
async fn credential_without_cnf_cannot_carry_key_binding() {
  let sd_jwt = SdJwtBuilder::new(json!({ "sub": "u1" }))
    .unwrap()
    .finish(&HmacSign::issuer(), "HS256")
    .await
    .unwrap();
  let presentation = present(sd_jwt, NOW).await;
  let result = kb_verifier(matching_options()).verify_at(&presentation, NOW).await;
  assert!(matches!(result.unwrap_err(), Error::MissingRequiredClaim("cnf")));
}

#[tokio::test]
async fn expecting_a_nonce_implies_requiring_key_binding() {
  let sd_jwt = issue_bound_credential().await;
  let verifier = kb_verifier(VerificationOptions {
    expected_nonce: Some(NONCE.to_owned()),
    require_key_binding: false,
    ..VerificationOptions::default()
  });
  let result = verifier.verify_at(&sd_jwt.presentation(), NOW).await;
  assert!(matches!(result.unwrap_err(), Error::MissingKeyBinding));
}

#[tokio::test]
async fn key_binding_requires_a_real_algorithm() {
  let sd_jwt = issue_bound_credential().await;
  let result = SdJwtPresenter::new(sd_jwt)
    .attach_key_binding(KeyBindingJwtBuilder::new(AUDIENCE, NONCE), &HmacSign::holder(), "none")
    .await;
  assert!(matches!(result.unwrap_err(), Error::AlgorithmNotAllowed(_)));
}
