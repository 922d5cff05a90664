// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

use crate::ct_eq;
use crate::Disclosure;
use crate::Error;
use crate::Hasher;
use crate::HasherRegistry;
use crate::JsonObject;
use crate::Result;
use crate::ARRAY_DIGEST_KEY;
use crate::DIGESTS_KEY;
use crate::SD_ALG;
use crate::SHA_ALG_NAME;

/// Substitutes digests in an SD-JWT payload by their corresponding plain text
/// values provided by disclosures.
pub struct SdObjectDecoder {
  registry: HasherRegistry,
}

impl SdObjectDecoder {
  /// Creates a new [`SdObjectDecoder`] with the built-in `sha-256`,
  /// `sha-384` and `sha-512` hashers.
  pub fn new() -> Self {
    Self {
      registry: HasherRegistry::new(),
    }
  }

  /// Creates a new [`SdObjectDecoder`] backed by `registry`.
  pub fn with_registry(registry: HasherRegistry) -> Self {
    Self { registry }
  }

  /// Adds a hasher, replacing and returning any existing hasher registered
  /// under the same algorithm name.
  pub fn register_hasher(&mut self, hasher: Box<dyn Hasher>) -> Option<Box<dyn Hasher>> {
    self.registry.register(hasher)
  }

  /// Permits weak `_sd_alg` names to resolve. Off by default.
  pub fn set_allow_weak_algorithms(&mut self, allow: bool) {
    self.registry.set_allow_weak_algorithms(allow);
  }

  /// Decodes an SD-JWT payload `object` by substituting the digests with their
  /// corresponding plain text values provided by `disclosures`.
  ///
  /// ## Notes
  /// * The hasher is determined by the `_sd_alg` property, defaulting to
  ///   `sha-256` when absent.
  /// * A digest with no matching disclosure is skipped silently: it belongs to
  ///   an undisclosed claim or is a decoy. Likewise a disclosure nothing
  ///   references adds no claims.
  /// * Claims like `exp` or `iat` are not validated in the process of decoding.
  /// * `_sd` and `_sd_alg` properties are removed from the output.
  pub fn decode(&self, object: &JsonObject, disclosures: &[Disclosure]) -> Result<JsonObject> {
    let hasher = self.determine_hasher(object)?;

    // Map of (disclosure digest) → (disclosure). Two disclosures hashing to
    // the same digest render the presentation invalid.
    let mut disclosure_map: Vec<(String, Disclosure)> = Vec::with_capacity(disclosures.len());
    for disclosure in disclosures {
      let digest = disclosure.digest(hasher);
      if Self::find_disclosure(&disclosure_map, &digest).is_some() {
        return Err(Error::DuplicateDigest(digest));
      }
      disclosure_map.push((digest, disclosure.clone()));
    }

    // `processed_digests` are kept track of in case one digest appears more
    // than once which renders the SD-JWT invalid.
    let mut processed_digests: Vec<String> = vec![];

    Self::decode_object(object, &disclosure_map, &mut processed_digests)
  }

  /// Resolves the hasher named by the object's `_sd_alg` property, or the
  /// `sha-256` default when the property is absent.
  pub fn determine_hasher(&self, object: &JsonObject) -> Result<&dyn Hasher> {
    let alg: &str = match object.get(SD_ALG) {
      Some(alg) => alg.as_str().ok_or_else(|| {
        Error::DataTypeMismatch("the value of `_sd_alg` is not a string".to_string())
      })?,
      None => SHA_ALG_NAME,
    };
    self.registry.get(alg)
  }

  /// Candidate digests are compared in constant time; the scan never exits
  /// early on a match.
  fn find_disclosure<'a>(map: &'a [(String, Disclosure)], digest: &str) -> Option<&'a Disclosure> {
    let mut found: Option<&Disclosure> = None;
    for (candidate, disclosure) in map {
      if ct_eq(candidate.as_bytes(), digest.as_bytes()) {
        found = Some(disclosure);
      }
    }
    found
  }

  fn decode_object(
    object: &JsonObject,
    disclosures: &[(String, Disclosure)],
    processed_digests: &mut Vec<String>,
  ) -> Result<JsonObject> {
    let mut output: JsonObject = object.clone();
    for (key, value) in object.iter() {
      if key == DIGESTS_KEY {
        let sd_array: &Vec<Value> = value
          .as_array()
          .ok_or_else(|| Error::DataTypeMismatch(format!("{DIGESTS_KEY} is not an array")))?;
        for digest in sd_array {
          let digest = digest
            .as_str()
            .ok_or_else(|| Error::DataTypeMismatch(format!("{DIGESTS_KEY} contains a non-string digest")))?;

          // Reject if any digests were found more than once.
          if processed_digests.iter().any(|processed| processed == digest) {
            return Err(Error::DuplicateDigest(digest.to_owned()));
          }

          // Check if a disclosure of this digest is available
          // and insert its claim name and value in the object.
          if let Some(disclosure) = Self::find_disclosure(disclosures, digest) {
            let claim_name = disclosure.claim_name.clone().ok_or_else(|| {
              Error::DisclosureTypeMismatch("array element disclosure referenced from an `_sd` array".to_string())
            })?;

            if output.contains_key(&claim_name) {
              return Err(Error::DuplicateClaim(claim_name));
            }
            processed_digests.push(digest.to_owned());

            let recursively_decoded = match &disclosure.claim_value {
              Value::Array(sub_array) => {
                Value::Array(Self::decode_array(sub_array, disclosures, processed_digests)?)
              }
              Value::Object(sub_object) => {
                Value::Object(Self::decode_object(sub_object, disclosures, processed_digests)?)
              }
              other => other.clone(),
            };

            output.insert(claim_name, recursively_decoded);
          }
        }
        output.shift_remove(DIGESTS_KEY);
        continue;
      }

      match value {
        Value::Object(sub_object) => {
          let decoded_object = Self::decode_object(sub_object, disclosures, processed_digests)?;
          output.insert(key.to_string(), Value::Object(decoded_object));
        }
        Value::Array(sub_array) => {
          let decoded_array = Self::decode_array(sub_array, disclosures, processed_digests)?;
          output.insert(key.to_string(), Value::Array(decoded_array));
        }
        // Only objects and arrays require decoding.
        _ => {}
      }
    }
    output.shift_remove(SD_ALG);
    Ok(output)
  }

  fn decode_array(
    array: &[Value],
    disclosures: &[(String, Disclosure)],
    processed_digests: &mut Vec<String>,
  ) -> Result<Vec<Value>> {
    let mut output: Vec<Value> = vec![];
    for value in array.iter() {
      match value {
        Value::Object(object) if object.contains_key(ARRAY_DIGEST_KEY) => {
          if object.len() != 1 {
            return Err(Error::DataTypeMismatch(
              "array disclosure object contains keys other than `...`".to_string(),
            ));
          }
          let digest = object
            .get(ARRAY_DIGEST_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::DataTypeMismatch(format!("{ARRAY_DIGEST_KEY} is not a string")))?;

          // Reject if any digests were found more than once.
          if processed_digests.iter().any(|processed| processed == digest) {
            return Err(Error::DuplicateDigest(digest.to_owned()));
          }

          if let Some(disclosure) = Self::find_disclosure(disclosures, digest) {
            if disclosure.claim_name.is_some() {
              return Err(Error::DisclosureTypeMismatch(
                "object property disclosure referenced from an array position".to_string(),
              ));
            }
            processed_digests.push(digest.to_owned());

            let recursively_decoded = match &disclosure.claim_value {
              Value::Array(sub_array) => {
                Value::Array(Self::decode_array(sub_array, disclosures, processed_digests)?)
              }
              Value::Object(sub_object) => {
                Value::Object(Self::decode_object(sub_object, disclosures, processed_digests)?)
              }
              other => other.clone(),
            };
            output.push(recursively_decoded);
          }
          // An unresolved digest conceals an undisclosed element: the array
          // simply shortens, no placeholder is emitted.
        }
        Value::Object(object) => {
          output.push(Value::Object(Self::decode_object(object, disclosures, processed_digests)?));
        }
        Value::Array(sub_array) => {
          output.push(Value::Array(Self::decode_array(sub_array, disclosures, processed_digests)?));
        }
        other => output.push(other.clone()),
      }
    }

    Ok(output)
  }
}

impl Default for SdObjectDecoder {
  fn default() -> Self {
    Self::new()
  }
}
