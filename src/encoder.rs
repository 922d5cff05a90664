// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use rand::seq::SliceRandom;
use serde_json::json;
use serde_json::Value;

use crate::b64url_encode;
use crate::random_bytes;
use crate::random_salt;
use crate::Disclosure;
use crate::DisclosureDirective;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::Result;
use crate::Sha256Hasher;

pub(crate) const DIGESTS_KEY: &str = "_sd";
pub(crate) const ARRAY_DIGEST_KEY: &str = "...";
pub(crate) const SD_ALG: &str = "_sd_alg";
pub(crate) const DEFAULT_SALT_SIZE: usize = 30;
pub(crate) const MIN_SALT_SIZE: usize = 16;
pub(crate) const RESERVED_CLAIM_NAMES: [&str; 3] = [DIGESTS_KEY, SD_ALG, ARRAY_DIGEST_KEY];

// Decoy digests hash a fresh random buffer of this size, never a disclosure.
const DECOY_BUFFER_SIZE: usize = 64;

/// Transforms a JSON object into an SD-JWT payload by substituting the values
/// a [`DisclosureDirective`] marks with their corresponding disclosure
/// digests.
#[derive(Debug, Clone)]
pub struct SdObjectEncoder<H: Hasher = Sha256Hasher> {
  /// The object in JSON format.
  object: JsonObject,
  /// Size of random data used to generate the salts for disclosures in bytes.
  /// Constant length for readability considerations.
  salt_size: usize,
  /// The hash function used to create digests.
  hasher: H,
}

impl TryFrom<Value> for SdObjectEncoder {
  type Error = crate::Error;

  fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
    Self::with_custom_hasher(value, Sha256Hasher::new())
  }
}

impl SdObjectEncoder {
  /// Creates a new [`SdObjectEncoder`] with `sha-256` hash function from a serializable object.
  ///
  /// ## Error
  /// Returns [`Error::DeserializationError`] if `object` can not be serialized into a valid JSON object.
  pub fn try_from_serializable<T: serde::Serialize>(object: T) -> Result<Self> {
    let value = serde_json::to_value(object).map_err(|e| Error::DeserializationError(e.to_string()))?;
    Self::try_from(value)
  }
}

impl<H: Hasher> SdObjectEncoder<H> {
  /// Creates a new [`SdObjectEncoder`] with custom hash function to create digests.
  pub fn with_custom_hasher(object: Value, hasher: H) -> Result<Self> {
    Self::with_custom_hasher_and_salt_size(object, hasher, DEFAULT_SALT_SIZE)
  }

  /// Creates a new [`SdObjectEncoder`] with custom hash function to create digests, and custom salt size.
  pub fn with_custom_hasher_and_salt_size(object: Value, hasher: H, salt_size: usize) -> Result<Self> {
    if salt_size < MIN_SALT_SIZE {
      return Err(Error::InvalidSaltSize);
    }
    match object {
      Value::Object(object) => Ok(Self {
        object,
        salt_size,
        hasher,
      }),
      _ => Err(Error::DataTypeMismatch("expected object".to_owned())),
    }
  }

  /// Conceals every entry and element the directive marks, replacing object
  /// properties with `_sd` digests and array elements with
  /// `{"...": <digest>}` markers. Every `_sd` array touched is shuffled.
  ///
  /// Returns the disclosures for the concealed values in creation order.
  ///
  /// ## Error
  /// [`Error::ReservedKeyUsed`] if the input object contains `_sd`,
  /// `_sd_alg` or `...` as a key anywhere.
  pub fn transform(&mut self, directive: &DisclosureDirective) -> Result<Vec<Disclosure>> {
    Self::check_reserved_keys(&self.object)?;
    let mut disclosures = Vec::new();
    Self::transform_object(&mut self.object, directive, &self.hasher, self.salt_size, &mut disclosures)?;
    Ok(disclosures)
  }

  /// Conceals everything: the object is transformed depth-first so that every
  /// object entry and every array element at every level becomes its own
  /// disclosure, nested ones embedded in their parent's disclosed value.
  pub fn transform_all(&mut self) -> Result<Vec<Disclosure>> {
    Self::check_reserved_keys(&self.object)?;
    let mut disclosures = Vec::new();
    Self::transform_object_all(&mut self.object, &self.hasher, self.salt_size, &mut disclosures)?;
    Ok(disclosures)
  }

  fn transform_object(
    object: &mut JsonObject,
    directive: &DisclosureDirective,
    hasher: &dyn Hasher,
    salt_size: usize,
    disclosures: &mut Vec<Disclosure>,
  ) -> Result<()> {
    let mut digests: Vec<Value> = Vec::new();
    let keys: Vec<String> = object.keys().cloned().collect();
    for key in keys {
      let Some(sub_directive) = directive.entry(&key) else {
        continue;
      };
      if sub_directive.is_hidden() {
        let value = object.shift_remove(&key).unwrap_or(Value::Null);
        let disclosure = Disclosure::new(random_salt(salt_size), Some(key), value)?;
        digests.push(Value::String(disclosure.digest(hasher)));
        disclosures.push(disclosure);
      } else {
        match object.get_mut(&key) {
          Some(Value::Object(sub_object)) => {
            Self::transform_object(sub_object, sub_directive, hasher, salt_size, disclosures)?;
          }
          Some(Value::Array(sub_array)) => {
            Self::transform_array(sub_array, sub_directive, hasher, salt_size, disclosures)?;
          }
          // Scalars are never themselves disclosable.
          _ => {}
        }
      }
    }
    if !digests.is_empty() {
      Self::add_digests_to_object(object, digests)?;
    }
    Ok(())
  }

  fn transform_array(
    array: &mut [Value],
    directive: &DisclosureDirective,
    hasher: &dyn Hasher,
    salt_size: usize,
    disclosures: &mut Vec<Disclosure>,
  ) -> Result<()> {
    for (index, element) in array.iter_mut().enumerate() {
      let Some(sub_directive) = directive.element(index) else {
        continue;
      };
      if sub_directive.is_hidden() {
        let value = element.take();
        let disclosure = Disclosure::new(random_salt(salt_size), None, value)?;
        *element = json!({ ARRAY_DIGEST_KEY: disclosure.digest(hasher) });
        disclosures.push(disclosure);
      } else {
        match element {
          Value::Object(sub_object) => {
            Self::transform_object(sub_object, sub_directive, hasher, salt_size, disclosures)?;
          }
          Value::Array(sub_array) => {
            Self::transform_array(sub_array, sub_directive, hasher, salt_size, disclosures)?;
          }
          _ => {}
        }
      }
    }
    Ok(())
  }

  fn transform_object_all(
    object: &mut JsonObject,
    hasher: &dyn Hasher,
    salt_size: usize,
    disclosures: &mut Vec<Disclosure>,
  ) -> Result<()> {
    let keys: Vec<String> = object.keys().cloned().collect();
    let mut digests: Vec<Value> = Vec::with_capacity(keys.len());
    for key in keys {
      let mut value = object.shift_remove(&key).unwrap_or(Value::Null);
      match &mut value {
        Value::Object(sub_object) => Self::transform_object_all(sub_object, hasher, salt_size, disclosures)?,
        Value::Array(sub_array) => Self::transform_array_all(sub_array, hasher, salt_size, disclosures)?,
        _ => {}
      }
      let disclosure = Disclosure::new(random_salt(salt_size), Some(key), value)?;
      digests.push(Value::String(disclosure.digest(hasher)));
      disclosures.push(disclosure);
    }
    if !digests.is_empty() {
      Self::add_digests_to_object(object, digests)?;
    }
    Ok(())
  }

  fn transform_array_all(
    array: &mut [Value],
    hasher: &dyn Hasher,
    salt_size: usize,
    disclosures: &mut Vec<Disclosure>,
  ) -> Result<()> {
    for element in array.iter_mut() {
      let mut value = element.take();
      match &mut value {
        Value::Object(sub_object) => Self::transform_object_all(sub_object, hasher, salt_size, disclosures)?,
        Value::Array(sub_array) => Self::transform_array_all(sub_array, hasher, salt_size, disclosures)?,
        _ => {}
      }
      let disclosure = Disclosure::new(random_salt(salt_size), None, value)?;
      *element = json!({ ARRAY_DIGEST_KEY: disclosure.digest(hasher) });
      disclosures.push(disclosure);
    }
    Ok(())
  }

  /// Adds `number_of_decoys` decoy digests to the top level `_sd` array and
  /// reshuffles it. Each decoy is the digest of a fresh 64-byte random
  /// buffer, indistinguishable from a real disclosure digest.
  ///
  /// Returns the decoy digests for auditing.
  pub fn add_decoys(&mut self, number_of_decoys: usize) -> Result<Vec<String>> {
    let decoys: Vec<String> = (0..number_of_decoys)
      .map(|_| b64url_encode(self.hasher.digest(&random_bytes(DECOY_BUFFER_SIZE))))
      .collect();
    if !decoys.is_empty() {
      let digests = decoys.iter().cloned().map(Value::String).collect();
      Self::add_digests_to_object(&mut self.object, digests)?;
    }
    Ok(decoys)
  }

  /// Merges digests into the object's `_sd` array, creating it if absent, and
  /// shuffles the combined array so digest order reveals nothing about the
  /// original claim positions.
  fn add_digests_to_object(object: &mut JsonObject, mut digests: Vec<Value>) -> Result<()> {
    if object.get(DIGESTS_KEY).is_none() {
      object.insert(DIGESTS_KEY.to_owned(), Value::Array(Vec::with_capacity(digests.len())));
    }
    match object.get_mut(DIGESTS_KEY) {
      Some(Value::Array(sd)) => {
        sd.append(&mut digests);
        sd.shuffle(&mut rand::thread_rng());
        Ok(())
      }
      _ => Err(Error::DataTypeMismatch(
        "invalid object: existing `_sd` type is not an array".to_string(),
      )),
    }
  }

  fn check_reserved_keys(object: &JsonObject) -> Result<()> {
    for (key, value) in object {
      if RESERVED_CLAIM_NAMES.contains(&key.as_str()) {
        return Err(Error::ReservedKeyUsed(key.clone()));
      }
      Self::check_reserved_keys_in_value(value)?;
    }
    Ok(())
  }

  fn check_reserved_keys_in_value(value: &Value) -> Result<()> {
    match value {
      Value::Object(object) => Self::check_reserved_keys(object),
      Value::Array(array) => array.iter().try_for_each(Self::check_reserved_keys_in_value),
      _ => Ok(()),
    }
  }

  /// Adds the `_sd_alg` property to the top level of the object.
  /// The value is taken from the [`crate::Hasher::alg_name`] implementation.
  pub fn add_sd_alg_property(&mut self) -> Option<Value> {
    self
      .object
      .insert(SD_ALG.to_string(), Value::String(self.hasher.alg_name().to_string()))
  }

  /// Returns a reference to the internal object.
  pub fn object(&self) -> &JsonObject {
    &self.object
  }

  pub(crate) fn into_object(self) -> JsonObject {
    self.object
  }

  /// Returns the used salt length.
  pub fn salt_size(&self) -> usize {
    self.salt_size
  }

  /// Sets size of random data used to generate the salts for disclosures in bytes.
  ///
  /// ## Warning
  /// Salt size must be >= 16.
  pub fn set_salt_size(&mut self, salt_size: usize) -> Result<()> {
    if salt_size < MIN_SALT_SIZE {
      Err(Error::InvalidSaltSize)
    } else {
      self.salt_size = salt_size;
      Ok(())
    }
  }
}

#[cfg(test)]
mod test {
  use serde::Serialize;
  use serde_json::json;
  use serde_json::Value;

  use super::SdObjectEncoder;
  use crate::DisclosureDirective;
  use crate::Error;
  use crate::Sha256Hasher;

  #[derive(Serialize)]
  struct TestStruct {
    id: String,
    claim2: Vec<String>,
  }

  fn object() -> Value {
    json!({
      "id": "did:value",
      "claim1": {
        "abc": true
      },
      "claim2": ["arr-value1", "arr-value2"]
    })
  }

  fn directive(value: Value) -> DisclosureDirective {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn simple() {
    let mut encoder = SdObjectEncoder::try_from(object()).unwrap();
    let disclosures = encoder
      .transform(&directive(json!({
        "id": true,
        "claim1": { "abc": true },
      })))
      .unwrap();
    assert_eq!(disclosures.len(), 2);
    assert!(encoder.object().get("id").is_none());
    assert_eq!(encoder.object().get("_sd").unwrap().as_array().unwrap().len(), 1);
    let claim1 = encoder.object().get("claim1").unwrap().as_object().unwrap();
    assert!(claim1.get("abc").is_none());
    assert_eq!(claim1.get("_sd").unwrap().as_array().unwrap().len(), 1);
  }

  #[test]
  fn array_elements() {
    let mut encoder = SdObjectEncoder::try_from(object()).unwrap();
    let disclosures = encoder
      .transform(&directive(json!({ "claim2": [true, false] })))
      .unwrap();
    assert_eq!(disclosures.len(), 1);
    assert!(disclosures[0].claim_name.is_none());
    let claim2 = encoder.object().get("claim2").unwrap().as_array().unwrap();
    assert_eq!(
      claim2[0].as_object().unwrap().keys().map(String::as_str).collect::<Vec<_>>(),
      vec!["..."]
    );
    assert_eq!(claim2[1], json!("arr-value2"));
  }

  #[test]
  fn unmentioned_keys_are_untouched() {
    let mut encoder = SdObjectEncoder::try_from(object()).unwrap();
    let disclosures = encoder.transform(&directive(json!({ "id": true }))).unwrap();
    assert_eq!(disclosures.len(), 1);
    assert_eq!(encoder.object().get("claim1"), Some(&json!({ "abc": true })));
    assert_eq!(encoder.object().get("claim2"), Some(&json!(["arr-value1", "arr-value2"])));
  }

  #[test]
  fn empty_directive_and_no_decoys_produce_no_sd() {
    let mut encoder = SdObjectEncoder::try_from(object()).unwrap();
    let disclosures = encoder.transform(&DisclosureDirective::none()).unwrap();
    assert!(disclosures.is_empty());
    assert!(encoder.object().get("_sd").is_none());
    assert!(serde_json::to_string(encoder.object()).unwrap().find("_sd").is_none());
  }

  #[test]
  fn transform_all_conceals_every_leaf() {
    let mut encoder = SdObjectEncoder::try_from(object()).unwrap();
    let disclosures = encoder.transform_all().unwrap();
    // id, claim1, claim1.abc, claim2, claim2[0], claim2[1]
    assert_eq!(disclosures.len(), 6);
    // Only the `_sd` array remains at the top level.
    assert_eq!(encoder.object().keys().map(String::as_str).collect::<Vec<_>>(), vec!["_sd"]);
    assert_eq!(encoder.object().get("_sd").unwrap().as_array().unwrap().len(), 3);
    // The disclosure embedding `claim1` carries its nested `_sd` array.
    let claim1 = disclosures
      .iter()
      .find(|disclosure| disclosure.claim_name.as_deref() == Some("claim1"))
      .unwrap();
    assert!(claim1.claim_value.as_object().unwrap().contains_key("_sd"));
  }

  #[test]
  fn decoys() {
    let mut encoder = SdObjectEncoder::try_from(object()).unwrap();
    let disclosures = encoder.transform(&directive(json!({ "id": true }))).unwrap();
    assert_eq!(disclosures.len(), 1);
    let decoys = encoder.add_decoys(10).unwrap();
    assert_eq!(decoys.len(), 10);
    assert_eq!(encoder.object().get("_sd").unwrap().as_array().unwrap().len(), 11);
  }

  #[test]
  fn reserved_keys_are_rejected_before_any_transformation() {
    for object in [
      json!({ "_sd": ["digest"] }),
      json!({ "_sd_alg": "sha-256" }),
      json!({ "claims": { "...": "digest" } }),
      json!({ "claims": [{ "_sd": [] }] }),
    ] {
      let mut encoder = SdObjectEncoder::try_from(object).unwrap();
      assert!(matches!(
        encoder.transform(&DisclosureDirective::none()),
        Err(Error::ReservedKeyUsed(_))
      ));
    }
  }

  #[test]
  fn salt_size_must_hold_enough_entropy() {
    assert!(matches!(
      SdObjectEncoder::with_custom_hasher_and_salt_size(object(), Sha256Hasher::new(), 15),
      Err(Error::InvalidSaltSize)
    ));
    let mut encoder = SdObjectEncoder::try_from(object()).unwrap();
    assert!(encoder.set_salt_size(15).is_err());
    encoder.set_salt_size(16).unwrap();
    assert_eq!(encoder.salt_size(), 16);
  }

  #[test]
  fn test_from_serializable() {
    let test_value = TestStruct {
      id: "did:value".to_string(),
      claim2: vec!["arr-value1".to_string(), "arr-value2".to_string()],
    };
    let mut encoder = SdObjectEncoder::try_from_serializable(test_value).unwrap();
    let disclosures = encoder.transform(&directive(json!({ "id": true }))).unwrap();
    assert_eq!(disclosures.len(), 1);
    assert!(encoder.object().get("id").is_none());
    assert_eq!(encoder.object().get("_sd").unwrap().as_array().unwrap().len(), 1);
  }
}
