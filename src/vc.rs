// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The SD-JWT VC profile: a thin layer over the generic engine that pins the
//! claims and header values an SD-JWT-based verifiable credential must carry
//! (`vct`, `iss`, `typ`), and exposes the seams for type-metadata integrity
//! and status checking. Fetching metadata or status lists is the host's
//! business.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::b64url_encode;
use crate::ct_eq;
use crate::DisclosureDirective;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::JwsSigner;
use crate::JwsVerifier;
use crate::KeyResolver;
use crate::RequiredKeyBinding;
use crate::Result;
use crate::SdJwt;
use crate::SdJwtBuilder;
use crate::SdJwtVerifier;
use crate::Sha256Hasher;
use crate::VerificationOptions;
use crate::VerifiedSdJwt;
use crate::SD_JWT_HEADER_TYP;

/// The `typ` header value of an SD-JWT VC.
pub const SD_JWT_VC_HEADER_TYP: &str = "vc+sd-jwt";

const VCT_INTEGRITY_KEY: &str = "vct#integrity";

/// Fetches the raw type-metadata document a credential's `vct` refers to, for
/// `vct#integrity` checking.
#[async_trait]
pub trait TypeMetadataResolver: Send + Sync {
  /// Returns the metadata document bytes, [`Error::Cancelled`] when the
  /// lookup was cancelled.
  async fn resolve(&self, vct: &str) -> Result<Vec<u8>>;
}

/// Checks the revocation status a credential's `status` claim points to.
#[async_trait]
pub trait StatusValidator: Send + Sync {
  /// Returns `Ok(())` for a credential in good standing, an error otherwise;
  /// [`Error::Cancelled`] when the lookup was cancelled.
  async fn validate(&self, status: &JsonObject) -> Result<()>;
}

/// Builder for an SD-JWT VC: guarantees `vct` and `iss` at the top level and
/// the VC `typ` header, delegating everything else to [`SdJwtBuilder`].
#[derive(Debug)]
pub struct SdJwtVcBuilder<H: Hasher = Sha256Hasher> {
  inner: SdJwtBuilder<H>,
  vct: String,
  iss: String,
  vct_integrity: Option<String>,
  status: Option<JsonObject>,
}

impl SdJwtVcBuilder {
  /// Creates a builder for a credential of type `vct` issued by `iss`.
  pub fn new<T: Serialize>(object: T, vct: impl Into<String>, iss: impl Into<String>) -> Result<Self> {
    Ok(Self {
      inner: SdJwtBuilder::new(object)?,
      vct: vct.into(),
      iss: iss.into(),
      vct_integrity: None,
      status: None,
    })
  }
}

impl<H: Hasher> SdJwtVcBuilder<H> {
  /// Creates a builder with a custom hash function.
  pub fn new_with_hasher<T: Serialize>(
    object: T,
    hasher: H,
    vct: impl Into<String>,
    iss: impl Into<String>,
  ) -> Result<Self> {
    Ok(Self {
      inner: SdJwtBuilder::new_with_hasher(object, hasher)?,
      vct: vct.into(),
      iss: iss.into(),
      vct_integrity: None,
      status: None,
    })
  }

  /// See [`SdJwtBuilder::disclosure_directive`].
  pub fn disclosure_directive(mut self, directive: DisclosureDirective) -> Self {
    self.inner = self.inner.disclosure_directive(directive);
    self
  }

  /// See [`SdJwtBuilder::all_disclosable`].
  pub fn all_disclosable(mut self) -> Self {
    self.inner = self.inner.all_disclosable();
    self
  }

  /// See [`SdJwtBuilder::add_decoys`].
  pub fn add_decoys(mut self, number_of_decoys: usize) -> Self {
    self.inner = self.inner.add_decoys(number_of_decoys);
    self
  }

  /// See [`SdJwtBuilder::header_parameter`].
  pub fn header_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
    self.inner = self.inner.header_parameter(key, value);
    self
  }

  /// See [`SdJwtBuilder::claim`].
  pub fn claim(mut self, name: impl Into<String>, value: Value) -> Result<Self> {
    self.inner = self.inner.claim(name, value)?;
    Ok(self)
  }

  /// See [`SdJwtBuilder::require_key_binding`].
  pub fn require_key_binding(mut self, key_bind: RequiredKeyBinding) -> Self {
    self.inner = self.inner.require_key_binding(key_bind);
    self
  }

  /// Attaches the `vct#integrity` digest of the externally published type
  /// metadata document.
  pub fn vct_integrity(mut self, digest: impl Into<String>) -> Self {
    self.vct_integrity = Some(digest.into());
    self
  }

  /// Attaches the `status` object pointing to a revocation oracle.
  pub fn status(mut self, status: JsonObject) -> Self {
    self.status = Some(status);
    self
  }

  /// Creates the SD-JWT VC.
  pub async fn finish<S>(self, signer: &S, alg: &str) -> Result<SdJwt>
  where
    S: JwsSigner,
  {
    let SdJwtVcBuilder {
      inner,
      vct,
      iss,
      vct_integrity,
      status,
    } = self;

    let mut builder = inner
      .type_header(SD_JWT_VC_HEADER_TYP)
      .claim("vct", Value::String(vct))?
      .claim("iss", Value::String(iss))?;
    if let Some(integrity) = vct_integrity {
      builder = builder.claim(VCT_INTEGRITY_KEY, Value::String(integrity))?;
    }
    if let Some(status) = status {
      builder = builder.claim("status", Value::Object(status))?;
    }

    builder.finish(signer, alg).await
  }
}

/// Verifies SD-JWT VC presentations: the generic pipeline plus the profile's
/// `typ`/`vct`/`iss` policy, optional type-metadata integrity and optional
/// status checking.
pub struct SdJwtVcVerifier<R, V> {
  inner: SdJwtVerifier<R, V>,
  expected_vct: Option<String>,
  metadata_resolver: Option<Box<dyn TypeMetadataResolver>>,
  status_validator: Option<Box<dyn StatusValidator>>,
}

impl<R, V> SdJwtVcVerifier<R, V>
where
  R: KeyResolver,
  V: JwsVerifier,
{
  pub fn new(resolver: R, verifier: V) -> Self {
    Self {
      inner: SdJwtVerifier::new(resolver, verifier).with_expected_typ(SD_JWT_VC_HEADER_TYP),
      expected_vct: None,
      metadata_resolver: None,
      status_validator: None,
    }
  }

  /// Replaces the verification policy.
  pub fn with_options(mut self, options: VerificationOptions) -> Self {
    self.inner = self.inner.with_options(options);
    self
  }

  /// Requires the credential's `vct` to equal this value.
  pub fn expected_vct(mut self, vct: impl Into<String>) -> Self {
    self.expected_vct = Some(vct.into());
    self
  }

  /// Enables `vct#integrity` checking through `resolver`.
  pub fn type_metadata_resolver(mut self, resolver: Box<dyn TypeMetadataResolver>) -> Self {
    self.metadata_resolver = Some(resolver);
    self
  }

  /// Enables status checking through `validator`.
  pub fn status_validator(mut self, validator: Box<dyn StatusValidator>) -> Self {
    self.status_validator = Some(validator);
    self
  }

  /// Adds a hasher for a non-built-in `_sd_alg`.
  pub fn register_hasher(&mut self, hasher: Box<dyn Hasher>) -> Option<Box<dyn Hasher>> {
    self.inner.register_hasher(hasher)
  }

  /// Verifies `presentation` against the current time.
  pub async fn verify(&self, presentation: &str) -> Result<VerifiedSdJwt> {
    self.verify_at(presentation, chrono::Utc::now().timestamp()).await
  }

  /// Verifies `presentation` against the instant `now` (seconds since the
  /// Unix epoch), supplied by the caller.
  pub async fn verify_at(&self, presentation: &str, now: i64) -> Result<VerifiedSdJwt> {
    let verified = self.inner.verify_at(presentation, now).await?;

    let typ = verified.header.get("typ").and_then(Value::as_str);
    let typ_accepted = if self.inner.options().strict_typ {
      typ == Some(SD_JWT_VC_HEADER_TYP)
    } else {
      matches!(typ, Some(SD_JWT_VC_HEADER_TYP) | Some(SD_JWT_HEADER_TYP))
    };
    if !typ_accepted {
      return Err(Error::MalformedJws(format!("unexpected typ header {typ:?}")));
    }

    let vct = verified
      .claims
      .get("vct")
      .and_then(Value::as_str)
      .ok_or(Error::MissingRequiredClaim("vct"))?;
    if let Some(expected) = self.expected_vct.as_deref() {
      if vct != expected {
        return Err(Error::VctMismatch);
      }
    }
    verified
      .claims
      .get("iss")
      .and_then(Value::as_str)
      .ok_or(Error::MissingRequiredClaim("iss"))?;

    if let (Some(resolver), Some(integrity)) = (
      self.metadata_resolver.as_deref(),
      verified.claims.get(VCT_INTEGRITY_KEY).and_then(Value::as_str),
    ) {
      let metadata = resolver.resolve(vct).await?;
      let digest = b64url_encode(Sha256Hasher::new().digest(&metadata));
      if !ct_eq(digest.as_bytes(), integrity.as_bytes()) {
        return Err(Error::DigestMismatch);
      }
    }

    if let (Some(validator), Some(Value::Object(status))) =
      (self.status_validator.as_deref(), verified.claims.get("status"))
    {
      validator.validate(status).await?;
    }

    Ok(verified)
  }
}
