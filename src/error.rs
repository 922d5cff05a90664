// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

/// Alias for a `Result` with the error type [`Error`].
pub type Result<T> = ::core::result::Result<T, Error>;

/// Failure modes of the SD-JWT engine.
///
/// Every error is terminal for the operation that produced it; callers may
/// retry the outer protocol exchange, never the core call. Diagnostic text
/// never contains salts or the contents of unrelated disclosures.
#[derive(Debug, thiserror::Error, strum::IntoStaticStr)]
#[non_exhaustive]
pub enum Error {
  #[error("compact SD-JWT is malformed: {0}")]
  MalformedCompact(String),

  #[error("disclosure is malformed: {0}")]
  MalformedDisclosure(String),

  #[error("JWS is malformed: {0}")]
  MalformedJws(String),

  #[error("signature verification failed")]
  SignatureInvalid,

  #[error("signing algorithm {0:?} is not allowed")]
  AlgorithmNotAllowed(String),

  #[error("unsupported hash algorithm {0:?}")]
  UnsupportedAlgorithm(String),

  #[error("hash algorithm {0:?} is too weak and its override is disabled")]
  WeakAlgorithm(String),

  #[error("no key could be resolved: {0}")]
  UnknownKey(String),

  #[error("key binding digest does not match the presented payload")]
  DigestMismatch,

  #[error("claim {0:?} of disclosure already exists")]
  DuplicateClaim(String),

  #[error("disclosure shape does not match its reference position: {0}")]
  DisclosureTypeMismatch(String),

  #[error("required claim {0:?} is missing")]
  MissingRequiredClaim(&'static str),

  #[error("key binding JWT was issued outside the allowed time window")]
  StaleKeyBinding,

  #[error("key binding audience does not match the expected value")]
  AudienceMismatch,

  #[error("key binding nonce does not match the expected value")]
  NonceMismatch,

  #[error("issuer does not match the expected value")]
  IssuerMismatch,

  #[error("credential type does not match the expected value")]
  VctMismatch,

  #[error("reserved key {0:?} used in input claims")]
  ReservedKeyUsed(String),

  #[error("operation cancelled by a collaborator")]
  Cancelled,

  #[error("digest {0} appears multiple times")]
  DuplicateDigest(String),

  #[error("key binding JWT is required but not present")]
  MissingKeyBinding,

  #[error("token is expired")]
  Expired,

  #[error("token is not yet valid")]
  NotYetValid,

  #[error("input is not valid base64url")]
  InvalidEncoding,

  #[error("salt size must be greater or equal 16")]
  InvalidSaltSize,

  #[error("signer failed: {0}")]
  JwsSignerFailure(String),

  #[error("data type is not expected: {0}")]
  DataTypeMismatch(String),

  #[error("invalid input: {0}")]
  DeserializationError(String),
}
