use anyhow::Context as _;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::Disclosure;
use crate::DisclosureDirective;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::JwsSigner;
use crate::RequiredKeyBinding;
use crate::Result;
use crate::SdAlg;
use crate::SdJwt;
use crate::SdObjectEncoder;
use crate::Sha256Hasher;
use crate::DEFAULT_SALT_SIZE;
use crate::RESERVED_CLAIM_NAMES;

/// The `typ` header value of an issuer-signed SD-JWT.
pub const SD_JWT_HEADER_TYP: &str = "dc+sd-jwt";

/// Builder structure to create an issuable SD-JWT.
#[derive(Debug)]
pub struct SdJwtBuilder<H: Hasher = Sha256Hasher> {
  encoder: SdObjectEncoder<H>,
  directive: DisclosureDirective,
  force_all: bool,
  decoy_count: usize,
  type_header: Option<String>,
  header_parameters: JsonObject,
  registered_claims: JsonObject,
  key_bind: Option<RequiredKeyBinding>,
}

impl SdJwtBuilder {
  /// Creates a new [`SdJwtBuilder`] with `sha-256` hash function.
  ///
  /// ## Error
  /// Returns [`Error::DataTypeMismatch`] if `object` is not a valid JSON object.
  pub fn new<T: Serialize>(object: T) -> Result<Self> {
    Self::new_with_hasher(object, Sha256Hasher::new())
  }
}

impl SdJwtBuilder<Box<dyn Hasher>> {
  /// Creates a new [`SdJwtBuilder`] hashing with one of the approved
  /// algorithms; `_sd_alg` is stamped accordingly.
  pub fn new_with_algorithm<T: Serialize>(object: T, algorithm: SdAlg) -> Result<Self> {
    Self::new_with_hasher(object, algorithm.hasher())
  }
}

impl<H: Hasher> SdJwtBuilder<H> {
  /// Creates a new [`SdJwtBuilder`] with custom hash function to create digests.
  pub fn new_with_hasher<T: Serialize>(object: T, hasher: H) -> Result<Self> {
    Self::new_with_hasher_and_salt_size(object, hasher, DEFAULT_SALT_SIZE)
  }

  /// Creates a new [`SdJwtBuilder`] with custom hash function to create digests, and custom salt size.
  pub fn new_with_hasher_and_salt_size<T: Serialize>(object: T, hasher: H, salt_size: usize) -> Result<Self> {
    let object = serde_json::to_value(object).map_err(|e| Error::DeserializationError(e.to_string()))?;
    let encoder = SdObjectEncoder::with_custom_hasher_and_salt_size(object, hasher, salt_size)?;
    Ok(Self {
      encoder,
      directive: DisclosureDirective::none(),
      force_all: false,
      decoy_count: 0,
      type_header: None,
      header_parameters: JsonObject::new(),
      registered_claims: JsonObject::new(),
      key_bind: None,
    })
  }

  /// Marks the claims to conceal. Entries and elements the directive does not
  /// mention stay plainly readable.
  pub fn disclosure_directive(mut self, directive: DisclosureDirective) -> Self {
    self.directive = directive;
    self
  }

  /// Makes every object entry and every array element, at every level,
  /// selectively disclosable. Overrides any directive.
  pub fn all_disclosable(mut self) -> Self {
    self.force_all = true;
    self
  }

  /// Adds `number_of_decoys` decoy digests to the top-level `_sd` array.
  /// A verifier cannot tell them apart from real disclosure digests.
  pub fn add_decoys(mut self, number_of_decoys: usize) -> Self {
    self.decoy_count += number_of_decoys;
    self
  }

  /// Overrides the `typ` header, which defaults to `dc+sd-jwt`.
  pub fn type_header(mut self, typ: impl Into<String>) -> Self {
    self.type_header = Some(typ.into());
    self
  }

  /// Adds a protected header parameter, e.g. `kid`. The `typ` and `alg`
  /// parameters are managed by the builder and cannot be overridden here.
  pub fn header_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
    self.header_parameters.insert(key.into(), value);
    self
  }

  /// Adds a registered top-level claim (e.g. `iss`, `exp`) that is stamped
  /// after the transformation and therefore never disclosable.
  ///
  /// ## Error
  /// [`Error::ReservedKeyUsed`] for `_sd`, `_sd_alg` and `...`.
  pub fn claim(mut self, name: impl Into<String>, value: Value) -> Result<Self> {
    let name = name.into();
    if RESERVED_CLAIM_NAMES.contains(&name.as_str()) {
      return Err(Error::ReservedKeyUsed(name));
    }
    self.registered_claims.insert(name, value);
    Ok(self)
  }

  /// Require a proof of possession of a given key from the holder.
  ///
  /// This operation adds a JWT confirmation (`cnf`) claim as specified in
  /// [RFC8300](https://www.rfc-editor.org/rfc/rfc7800.html#section-3).
  pub fn require_key_binding(mut self, key_bind: RequiredKeyBinding) -> Self {
    self.key_bind = Some(key_bind);
    self
  }

  /// Creates an SD-JWT with the provided data.
  ///
  /// Returns the signed token together with all real disclosures; the holder
  /// needs both.
  ///
  /// ## Error
  /// * [`Error::AlgorithmNotAllowed`] for an empty or `none` algorithm.
  /// * [`Error::ReservedKeyUsed`] if the source object carries a reserved key.
  /// * [`Error::JwsSignerFailure`] when the signer fails; nothing is signed if
  ///   the transformation failed first.
  pub async fn finish<S>(self, signer: &S, alg: &str) -> Result<SdJwt>
  where
    S: JwsSigner,
  {
    if alg.is_empty() || alg.eq_ignore_ascii_case("none") {
      return Err(Error::AlgorithmNotAllowed(alg.to_owned()));
    }

    let SdJwtBuilder {
      mut encoder,
      directive,
      force_all,
      decoy_count,
      type_header,
      header_parameters,
      registered_claims,
      key_bind,
    } = self;

    let disclosures: Vec<Disclosure> = if force_all {
      encoder.transform_all()?
    } else {
      encoder.transform(&directive)?
    };
    encoder.add_decoys(decoy_count)?;
    encoder.add_sd_alg_property();

    let mut object = encoder.into_object();
    for (name, value) in registered_claims {
      object.insert(name, value);
    }
    // Add key binding requirement as `cnf`.
    if let Some(key_bind) = key_bind {
      let key_bind = serde_json::to_value(key_bind).map_err(|e| Error::DeserializationError(e.to_string()))?;
      object.insert("cnf".to_string(), key_bind);
    }

    let mut header = header_parameters;
    header.insert(
      "typ".to_string(),
      Value::String(type_header.unwrap_or_else(|| SD_JWT_HEADER_TYP.to_string())),
    );
    header.insert("alg".to_string(), json!(alg));

    let jws = signer
      .sign(&header, &object)
      .await
      .map_err(|e| anyhow::anyhow!("jws failed: {e}"))
      .and_then(|jws_bytes| String::from_utf8(jws_bytes).context("invalid JWS"))
      .map_err(|e| Error::JwsSignerFailure(e.to_string()))?;

    let jwt = jws.parse()?;

    Ok(SdJwt::new(jwt, disclosures, None))
  }
}
