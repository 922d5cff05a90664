// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use rand::Rng;
use subtle::ConstantTimeEq;

use crate::Error;
use crate::Result;

/// Encodes `input` with the URL-safe base64 alphabet, no padding.
pub(crate) fn b64url_encode(input: impl AsRef<[u8]>) -> String {
  multibase::Base::Base64Url.encode(input)
}

/// Decodes URL-safe base64 without padding.
pub(crate) fn b64url_decode(input: &str) -> Result<Vec<u8>> {
  multibase::Base::Base64Url.decode(input).map_err(|_| Error::InvalidEncoding)
}

/// Byte equality without data-dependent early exit.
pub(crate) fn ct_eq(left: &[u8], right: &[u8]) -> bool {
  left.ct_eq(right).into()
}

pub(crate) fn random_bytes(len: usize) -> Vec<u8> {
  let mut rng = rand::thread_rng();
  (0..len).map(|_| rng.gen()).collect()
}

/// A fresh salt of `len` random bytes, base64url-encoded.
pub(crate) fn random_salt(len: usize) -> String {
  b64url_encode(random_bytes(len))
}
