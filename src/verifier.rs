// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use serde_json::Value;

use crate::ct_eq;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::JwsVerifier;
use crate::KeyBindingJwt;
use crate::KeyBindingJwtClaims;
use crate::KeyResolver;
use crate::Result;
use crate::SdJwt;
use crate::SdObjectDecoder;
use crate::SD_JWT_HEADER_TYP;
use crate::SD_JWT_VC_HEADER_TYP;

/// Default upper bound on `|now − iat|` of a key binding JWT, in seconds.
pub const DEFAULT_MAX_KB_AGE: i64 = 600;

/// Policy applied while verifying a presentation.
#[derive(Debug, Clone)]
pub struct VerificationOptions {
  /// Requires the verified `iss` claim to equal this value.
  pub expected_issuer: Option<String>,
  /// Requires the key binding `aud` claim to equal this value. Implies that a
  /// key binding JWT must be present.
  pub expected_audience: Option<String>,
  /// Requires the key binding `nonce` claim to equal this value. Implies that
  /// a key binding JWT must be present.
  pub expected_nonce: Option<String>,
  /// Upper bound on `|now − iat|` of the key binding JWT, in seconds.
  pub max_kb_age: i64,
  /// Fails verification when the presentation carries no key binding JWT.
  pub require_key_binding: bool,
  /// Symmetric tolerance on `exp`/`nbf`, in seconds.
  pub clock_skew: i64,
  /// Narrows the `typ` header check to the flow's own value. Without it the
  /// two recognized values (`dc+sd-jwt` and `vc+sd-jwt`) are accepted; any
  /// other `typ` is rejected either way.
  pub strict_typ: bool,
  /// Permits weak `_sd_alg` names, provided a matching hasher is registered.
  pub allow_weak_algorithms: bool,
  /// When set, the issuer and key binding `alg` must be in this list.
  /// `none` is refused regardless.
  pub allowed_signing_algorithms: Option<Vec<String>>,
}

impl Default for VerificationOptions {
  fn default() -> Self {
    Self {
      expected_issuer: None,
      expected_audience: None,
      expected_nonce: None,
      max_kb_age: DEFAULT_MAX_KB_AGE,
      require_key_binding: false,
      clock_skew: 0,
      strict_typ: false,
      allow_weak_algorithms: false,
      allowed_signing_algorithms: None,
    }
  }
}

/// The outcome of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedSdJwt {
  /// The issuer JWS protected header.
  pub header: JsonObject,
  /// The reconstructed claim tree: verified payload with all presented
  /// disclosures substituted and the reserved properties removed.
  pub claims: JsonObject,
  /// The validated key binding claims, when a key binding JWT was presented.
  pub key_binding: Option<KeyBindingJwtClaims>,
}

/// Verifies presentations: issuer signature, payload reconstruction and key
/// binding, under a [`VerificationOptions`] policy.
pub struct SdJwtVerifier<R, V> {
  resolver: R,
  verifier: V,
  decoder: SdObjectDecoder,
  options: VerificationOptions,
  /// The `typ` value `strict_typ` narrows to: the plain SD-JWT value here,
  /// overridden by the VC profile for its flow.
  expected_typ: &'static str,
}

impl<R, V> SdJwtVerifier<R, V>
where
  R: KeyResolver,
  V: JwsVerifier,
{
  /// Creates a verifier with the default policy.
  pub fn new(resolver: R, verifier: V) -> Self {
    Self {
      resolver,
      verifier,
      decoder: SdObjectDecoder::new(),
      options: VerificationOptions::default(),
      expected_typ: SD_JWT_HEADER_TYP,
    }
  }

  pub(crate) fn with_expected_typ(mut self, typ: &'static str) -> Self {
    self.expected_typ = typ;
    self
  }

  /// Replaces the verification policy.
  pub fn with_options(mut self, options: VerificationOptions) -> Self {
    self.decoder.set_allow_weak_algorithms(options.allow_weak_algorithms);
    self.options = options;
    self
  }

  pub fn options(&self) -> &VerificationOptions {
    &self.options
  }

  /// Adds a hasher for a non-built-in `_sd_alg`.
  pub fn register_hasher(&mut self, hasher: Box<dyn Hasher>) -> Option<Box<dyn Hasher>> {
    self.decoder.register_hasher(hasher)
  }

  /// Verifies `presentation` against the current time.
  pub async fn verify(&self, presentation: &str) -> Result<VerifiedSdJwt> {
    self.verify_at(presentation, Utc::now().timestamp()).await
  }

  /// Verifies `presentation` against the instant `now` (seconds since the
  /// Unix epoch), supplied by the caller.
  pub async fn verify_at(&self, presentation: &str, now: i64) -> Result<VerifiedSdJwt> {
    let sd_jwt = SdJwt::parse(presentation)?;

    // Issuer JWS.
    let jwt = sd_jwt.jwt();
    let alg = jwt
      .alg()
      .ok_or_else(|| Error::MalformedJws("missing `alg` header".to_string()))?;
    self.check_signing_alg(alg)?;
    let typ = jwt.typ();
    let typ_accepted = if self.options.strict_typ {
      typ == Some(self.expected_typ)
    } else {
      matches!(typ, Some(SD_JWT_HEADER_TYP) | Some(SD_JWT_VC_HEADER_TYP))
    };
    if !typ_accepted {
      return Err(Error::MalformedJws(format!("unexpected typ header {typ:?}")));
    }

    let claims_object = match serde_json::to_value(sd_jwt.claims()) {
      Ok(Value::Object(object)) => object,
      _ => return Err(Error::DeserializationError("invalid SD-JWT claims".to_string())),
    };

    // The resolver sees the parsed but not yet trusted header and claims.
    let key = self
      .resolver
      .resolve(&jwt.header, &claims_object)
      .await
      .map_err(|e| Error::UnknownKey(e.to_string()))?;
    let signature = jwt.signature()?;
    self
      .verifier
      .verify(alg, jwt.signing_input().as_bytes(), &signature, &key)
      .await
      .map_err(|_| Error::SignatureInvalid)?;

    // Time and issuer policy over the now-verified payload.
    if let Some(expected) = self.options.expected_issuer.as_deref() {
      if claims_object.get("iss").and_then(Value::as_str) != Some(expected) {
        return Err(Error::IssuerMismatch);
      }
    }
    if let Some(exp) = claims_object.get("exp").and_then(Value::as_i64) {
      if now > exp + self.options.clock_skew {
        return Err(Error::Expired);
      }
    }
    if let Some(nbf) = claims_object.get("nbf").and_then(Value::as_i64) {
      if now < nbf - self.options.clock_skew {
        return Err(Error::NotYetValid);
      }
    }

    // Reconstruct the disclosed claims.
    let hasher = self.decoder.determine_hasher(&claims_object)?;
    let claims = self.decoder.decode(&claims_object, sd_jwt.disclosures())?;

    // Key binding.
    let key_binding = match sd_jwt.key_binding_jwt() {
      Some(kb_jwt) => Some(self.verify_key_binding(&sd_jwt, kb_jwt, hasher, now).await?),
      None => {
        if self.options.require_key_binding
          || self.options.expected_audience.is_some()
          || self.options.expected_nonce.is_some()
        {
          return Err(Error::MissingKeyBinding);
        }
        None
      }
    };

    Ok(VerifiedSdJwt {
      header: jwt.header.clone(),
      claims,
      key_binding,
    })
  }

  async fn verify_key_binding(
    &self,
    sd_jwt: &SdJwt,
    kb_jwt: &KeyBindingJwt,
    hasher: &dyn Hasher,
    now: i64,
  ) -> Result<KeyBindingJwtClaims> {
    let jwt = kb_jwt.jwt();
    // `typ == "kb+jwt"` and a present, non-`none` `alg` were enforced when
    // the KB-JWT was parsed.
    let alg = jwt
      .alg()
      .ok_or_else(|| Error::MalformedJws("missing `alg` header".to_string()))?;
    self.check_signing_alg(alg)?;

    // The holder key is taken from the *verified* issuer payload.
    let required_kb = sd_jwt.required_key_bind().ok_or(Error::MissingRequiredClaim("cnf"))?;
    let holder_key = serde_json::to_value(required_kb).map_err(|e| Error::DeserializationError(e.to_string()))?;

    let signature = jwt.signature()?;
    self
      .verifier
      .verify(alg, jwt.signing_input().as_bytes(), &signature, &holder_key)
      .await
      .map_err(|_| Error::SignatureInvalid)?;

    let claims = kb_jwt.claims();

    let expected_sd_hash = hasher.encoded_digest(&sd_jwt.sd_hash_input());
    if !ct_eq(expected_sd_hash.as_bytes(), claims.sd_hash.as_bytes()) {
      return Err(Error::DigestMismatch);
    }

    if let Some(aud) = self.options.expected_audience.as_deref() {
      if claims.aud != aud {
        return Err(Error::AudienceMismatch);
      }
    }
    if let Some(nonce) = self.options.expected_nonce.as_deref() {
      if claims.nonce != nonce {
        return Err(Error::NonceMismatch);
      }
    }
    if (now - claims.iat).abs() > self.options.max_kb_age {
      return Err(Error::StaleKeyBinding);
    }

    Ok(claims.clone())
  }

  fn check_signing_alg(&self, alg: &str) -> Result<()> {
    if alg.eq_ignore_ascii_case("none") {
      return Err(Error::AlgorithmNotAllowed(alg.to_owned()));
    }
    if let Some(allowed) = &self.options.allowed_signing_algorithms {
      if !allowed.iter().any(|candidate| candidate == alg) {
        return Err(Error::AlgorithmNotAllowed(alg.to_owned()));
      }
    }
    Ok(())
  }
}
