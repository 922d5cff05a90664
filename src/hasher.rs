// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use crypto::hashes::sha::SHA256;
use crypto::hashes::sha::SHA256_LEN;
use crypto::hashes::sha::SHA384;
use crypto::hashes::sha::SHA384_LEN;
use crypto::hashes::sha::SHA512;
use crypto::hashes::sha::SHA512_LEN;

use crate::b64url_encode;
use crate::Error;
use crate::Result;

/// The default hash algorithm, used whenever `_sd_alg` is absent.
pub const SHA_ALG_NAME: &str = "sha-256";

/// Algorithm names that are never acceptable for `_sd_alg` unless the
/// weak-algorithm override is explicitly enabled.
const WEAK_ALG_NAMES: [&str; 3] = ["md5", "sha-1", "sha1"];

/// Used to implement hash functions to be used for creating digests.
///
/// ## Note
///
/// Implementations of this trait are expected only for algorithms listed in
/// the IANA "Named Information Hash Algorithm" registry.
/// See [Hash Function Claim](https://www.rfc-editor.org/rfc/rfc9901.html#name-hash-function-claim)
pub trait Hasher: Sync + Send {
  /// Digests input to produce unique fixed-size hash value in bytes.
  fn digest(&self, input: &[u8]) -> Vec<u8>;

  /// Returns the name of hash function used, lowercase.
  fn alg_name(&self) -> &'static str;

  /// Returns the base64url-encoded digest of a `disclosure`.
  fn encoded_digest(&self, disclosure: &str) -> String {
    b64url_encode(self.digest(disclosure.as_bytes()))
  }
}

/// An implementation of [`Hasher`] that uses the `sha-256` hash function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl Sha256Hasher {
  pub const ALG_NAME: &'static str = "sha-256";

  /// Creates a new [`Sha256Hasher`].
  pub fn new() -> Self {
    Sha256Hasher {}
  }
}

impl Hasher for Sha256Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA256_LEN] = Default::default();
    SHA256(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha256Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha-384` hash function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha384Hasher;

impl Sha384Hasher {
  pub const ALG_NAME: &'static str = "sha-384";

  /// Creates a new [`Sha384Hasher`].
  pub fn new() -> Self {
    Sha384Hasher {}
  }
}

impl Hasher for Sha384Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA384_LEN] = [0; SHA384_LEN];
    SHA384(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha384Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha-512` hash function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha512Hasher;

impl Sha512Hasher {
  pub const ALG_NAME: &'static str = "sha-512";

  /// Creates a new [`Sha512Hasher`].
  pub fn new() -> Self {
    Sha512Hasher {}
  }
}

impl Hasher for Sha512Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA512_LEN] = [0; SHA512_LEN];
    SHA512(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha512Hasher::ALG_NAME
  }
}

impl Hasher for Box<dyn Hasher> {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    self.as_ref().digest(input)
  }

  fn alg_name(&self) -> &'static str {
    self.as_ref().alg_name()
  }
}

/// Identifier of an approved `_sd_alg` value.
///
/// Parses case-insensitively, renders lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum SdAlg {
  #[strum(serialize = "sha-256")]
  Sha256,
  #[strum(serialize = "sha-384")]
  Sha384,
  #[strum(serialize = "sha-512")]
  Sha512,
}

impl SdAlg {
  /// Returns the hasher implementing this algorithm.
  pub fn hasher(&self) -> Box<dyn Hasher> {
    match self {
      SdAlg::Sha256 => Box::new(Sha256Hasher::new()),
      SdAlg::Sha384 => Box::new(Sha384Hasher::new()),
      SdAlg::Sha512 => Box::new(Sha512Hasher::new()),
    }
  }
}

/// Maps `_sd_alg` identifiers to [`Hasher`] implementations.
///
/// Weak identifiers (`md5`, `sha-1`) are refused unless the override is
/// enabled; even then the registry ships no weak primitive, so a weak name
/// only resolves if a matching hasher was registered by the caller.
pub struct HasherRegistry {
  hashers: BTreeMap<String, Box<dyn Hasher>>,
  allow_weak: bool,
}

impl HasherRegistry {
  /// Creates a registry holding the `sha-256`, `sha-384` and `sha-512`
  /// hashers.
  pub fn new() -> Self {
    let mut registry = Self::empty();
    registry.register(Box::new(Sha256Hasher::new()));
    registry.register(Box::new(Sha384Hasher::new()));
    registry.register(Box::new(Sha512Hasher::new()));
    registry
  }

  /// Creates a registry without any hashers.
  pub fn empty() -> Self {
    Self {
      hashers: BTreeMap::new(),
      allow_weak: false,
    }
  }

  /// Permits weak algorithm names to resolve. Off by default; intended only
  /// for negative-compatibility testing.
  pub fn set_allow_weak_algorithms(&mut self, allow: bool) {
    self.allow_weak = allow;
  }

  /// Adds a hasher.
  ///
  /// If a hasher for the same algorithm [`Hasher::alg_name`] already exists, it will be replaced and
  /// the existing hasher will be returned, otherwise `None`.
  pub fn register(&mut self, hasher: Box<dyn Hasher>) -> Option<Box<dyn Hasher>> {
    let alg_name = hasher.as_ref().alg_name().to_string();

    self.hashers.insert(alg_name, hasher)
  }

  /// Resolves an algorithm identifier, case-insensitively.
  ///
  /// ## Error
  /// [`Error::WeakAlgorithm`] for `md5`/`sha-1` without the override,
  /// [`Error::UnsupportedAlgorithm`] for any name no hasher is registered for.
  pub fn get(&self, alg: &str) -> Result<&dyn Hasher> {
    let normalized = alg.to_ascii_lowercase();
    if WEAK_ALG_NAMES.contains(&normalized.as_str()) && !self.allow_weak {
      return Err(Error::WeakAlgorithm(normalized));
    }
    self
      .hashers
      .get(&normalized)
      .map(AsRef::as_ref)
      .ok_or(Error::UnsupportedAlgorithm(normalized))
  }
}

impl Default for HasherRegistry {
  fn default() -> Self {
    Self::new()
  }
}
