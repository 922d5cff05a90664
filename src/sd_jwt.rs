// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::Disclosure;
use crate::Error;
use crate::JsonObject;
use crate::Jwt;
use crate::KeyBindingJwt;
use crate::RequiredKeyBinding;
use crate::Result;
use crate::SdObjectDecoder;

/// The top-level claims of an SD-JWT payload: the reserved selective
/// disclosure properties plus everything else the issuer asserted.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SdJwtClaims {
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub _sd: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub _sd_alg: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub cnf: Option<RequiredKeyBinding>,
  #[serde(flatten)]
  properties: JsonObject,
}

impl Deref for SdJwtClaims {
  type Target = JsonObject;
  fn deref(&self) -> &Self::Target {
    &self.properties
  }
}

/// Representation of an SD-JWT of the format
/// `<Issuer-signed JWT>~<Disclosure 1>~<Disclosure 2>~...~<Disclosure N>~<optional KB-JWT>`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SdJwt {
  /// The JWT part.
  jwt: Jwt<SdJwtClaims>,
  /// The disclosures part.
  disclosures: Vec<Disclosure>,
  /// The optional key binding JWT.
  key_binding_jwt: Option<KeyBindingJwt>,
}

impl SdJwt {
  /// Creates a new [`SdJwt`] from its components.
  pub(crate) fn new(
    jwt: Jwt<SdJwtClaims>,
    disclosures: Vec<Disclosure>,
    key_binding_jwt: Option<KeyBindingJwt>,
  ) -> Self {
    Self {
      jwt,
      disclosures,
      key_binding_jwt,
    }
  }

  pub fn header(&self) -> &JsonObject {
    &self.jwt.header
  }

  pub fn claims(&self) -> &SdJwtClaims {
    &self.jwt.claims
  }

  pub fn disclosures(&self) -> &[Disclosure] {
    &self.disclosures
  }

  pub fn required_key_bind(&self) -> Option<&RequiredKeyBinding> {
    self.claims().cnf.as_ref()
  }

  pub fn key_binding_jwt(&self) -> Option<&KeyBindingJwt> {
    self.key_binding_jwt.as_ref()
  }

  pub(crate) fn jwt(&self) -> &Jwt<SdJwtClaims> {
    &self.jwt
  }

  pub(crate) fn retain_disclosures<F>(&mut self, mut predicate: F)
  where
    F: FnMut(&Disclosure) -> bool,
  {
    self.disclosures.retain(|disclosure| predicate(disclosure));
  }

  pub fn attach_key_binding_jwt(&mut self, kb_jwt: KeyBindingJwt) {
    self.key_binding_jwt = Some(kb_jwt);
  }

  /// Serializes the components into the final SD-JWT.
  ///
  /// Without a key binding JWT the string ends with a single trailing `~`;
  /// with one, the KB-JWT is the last segment.
  pub fn presentation(&self) -> String {
    let mut out = self.jwt.as_str().to_owned();
    out.push('~');
    for disclosure in &self.disclosures {
      out.push_str(disclosure.as_str());
      out.push('~');
    }
    if let Some(key_binding_jwt) = &self.key_binding_jwt {
      out.push_str(key_binding_jwt.jwt().as_str());
    }
    out
  }

  /// The bytes `sd_hash` commits to: everything up to and including the last
  /// `~`, i.e. the issuer JWS plus the presented disclosures, KB-JWT excluded.
  pub(crate) fn sd_hash_input(&self) -> String {
    let presentation = self.presentation();
    match presentation.rfind('~') {
      Some(index) => presentation[..=index].to_string(),
      None => presentation,
    }
  }

  /// Parses an SD-JWT into its components as [`SdJwt`].
  ///
  /// ## Error
  /// Returns [`Error::MalformedCompact`] when the segment structure is
  /// violated: fewer than two segments, an empty issuer JWS, or an empty
  /// disclosure segment.
  pub fn parse(sd_jwt: &str) -> Result<Self> {
    let segments: Vec<&str> = sd_jwt.split('~').collect();
    if segments.len() < 2 {
      return Err(Error::MalformedCompact(
        "SD-JWT format is invalid, less than 2 segments".to_string(),
      ));
    }
    let jwt_segment = segments.first().copied().unwrap_or_default();
    if jwt_segment.is_empty() {
      return Err(Error::MalformedCompact("the issuer JWS segment is empty".to_string()));
    }
    let jwt = jwt_segment.parse()?;

    let disclosures: Vec<Disclosure> = segments[1..segments.len() - 1]
      .iter()
      .map(|segment| {
        if segment.is_empty() {
          Err(Error::MalformedCompact("empty disclosure segment".to_string()))
        } else {
          Disclosure::parse(segment)
        }
      })
      .try_collect()?;

    let last_segment = segments.last().copied().unwrap_or_default();
    let key_binding_jwt = (!last_segment.is_empty()).then(|| last_segment.parse()).transpose()?;

    Ok(Self {
      jwt,
      disclosures,
      key_binding_jwt,
    })
  }

  /// Returns the JSON object obtained by replacing all disclosures into their
  /// corresponding concealable claims, without verifying the signature.
  ///
  /// The hash algorithm is taken from the payload's `_sd_alg` property.
  pub fn into_disclosed_object(self) -> Result<JsonObject> {
    let decoder = SdObjectDecoder::new();
    let object = match serde_json::to_value(self.claims()) {
      Ok(Value::Object(object)) => object,
      _ => return Err(Error::DeserializationError("invalid SD-JWT claims".to_string())),
    };
    decoder.decode(&object, &self.disclosures)
  }
}

impl Display for SdJwt {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&(self.presentation()))
  }
}

impl FromStr for SdJwt {
  type Err = Error;
  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    Self::parse(s)
  }
}

#[cfg(test)]
mod test {
  use crate::Error;
  use crate::SdJwt;

  const SD_JWT: &str = "eyJhbGciOiAiRVMyNTYiLCAidHlwIjogImV4YW1wbGUrc2Qtand0In0.eyJfc2QiOiBbIkM5aW5wNllvUmFFWFI0Mjd6WUpQN1FyazFXSF84YmR3T0FfWVVyVW5HUVUiLCAiS3VldDF5QWEwSElRdlluT1ZkNTloY1ZpTzlVZzZKMmtTZnFZUkJlb3d2RSIsICJNTWxkT0ZGekIyZDB1bWxtcFRJYUdlcmhXZFVfUHBZZkx2S2hoX2ZfOWFZIiwgIlg2WkFZT0lJMnZQTjQwVjd4RXhad1Z3ejd5Um1MTmNWd3Q1REw4Ukx2NGciLCAiWTM0em1JbzBRTExPdGRNcFhHd2pCZ0x2cjE3eUVoaFlUMEZHb2ZSLWFJRSIsICJmeUdwMFdUd3dQdjJKRFFsbjFsU2lhZW9iWnNNV0ExMGJRNTk4OS05RFRzIiwgIm9tbUZBaWNWVDhMR0hDQjB1eXd4N2ZZdW8zTUhZS08xNWN6LVJaRVlNNVEiLCAiczBCS1lzTFd4UVFlVTh0VmxsdE03TUtzSVJUckVJYTFQa0ptcXhCQmY1VSJdLCAiaXNzIjogImh0dHBzOi8vaXNzdWVyLmV4YW1wbGUuY29tIiwgImlhdCI6IDE2ODMwMDAwMDAsICJleHAiOiAxODgzMDAwMDAwLCAiYWRkcmVzcyI6IHsiX3NkIjogWyI2YVVoelloWjdTSjFrVm1hZ1FBTzN1MkVUTjJDQzFhSGhlWnBLbmFGMF9FIiwgIkF6TGxGb2JrSjJ4aWF1cFJFUHlvSnotOS1OU2xkQjZDZ2pyN2ZVeW9IemciLCAiUHp6Y1Z1MHFiTXVCR1NqdWxmZXd6a2VzRDl6dXRPRXhuNUVXTndrclEtayIsICJiMkRrdzBqY0lGOXJHZzhfUEY4WmN2bmNXN3p3Wmo1cnlCV3ZYZnJwemVrIiwgImNQWUpISVo4VnUtZjlDQ3lWdWIyVWZnRWs4anZ2WGV6d0sxcF9KbmVlWFEiLCAiZ2xUM2hyU1U3ZlNXZ3dGNVVEWm1Xd0JUdzMyZ25VbGRJaGk4aEdWQ2FWNCIsICJydkpkNmlxNlQ1ZWptc0JNb0d3dU5YaDlxQUFGQVRBY2k0MG9pZEVlVnNBIiwgInVOSG9XWWhYc1poVkpDTkUyRHF5LXpxdDd0NjlnSkt5NVFhRnY3R3JNWDQiXX0sICJfc2RfYWxnIjogInNoYS0yNTYifQ.gR6rSL7urX79CNEvTQnP1MH5xthG11ucIV44SqKFZ4Pvlu_u16RfvXQd4k4CAIBZNKn2aTI18TfvFwV97gJFoA~WyJHMDJOU3JRZmpGWFE3SW8wOXN5YWpBIiwgInJlZ2lvbiIsICJcdTZlMmZcdTUzM2EiXQ~WyJsa2x4RjVqTVlsR1RQVW92TU5JdkNBIiwgImNvdW50cnkiLCAiSlAiXQ~";

  #[test]
  fn parse() {
    let sd_jwt = SdJwt::parse(SD_JWT).unwrap();
    assert_eq!(sd_jwt.disclosures().len(), 2);
    assert!(sd_jwt.key_binding_jwt().is_none());
    assert_eq!(sd_jwt.claims()._sd.len(), 8);
    assert_eq!(sd_jwt.claims()._sd_alg.as_deref(), Some("sha-256"));
  }

  #[test]
  fn round_trip_ser_des() {
    let sd_jwt = SdJwt::parse(SD_JWT).unwrap();
    assert_eq!(&sd_jwt.to_string(), SD_JWT);
  }

  #[test]
  fn no_disclosures_still_requires_the_trailing_separator() {
    let jwt = SD_JWT.split('~').next().unwrap();
    assert!(matches!(SdJwt::parse(jwt), Err(Error::MalformedCompact(_))));
    let sd_jwt = SdJwt::parse(&format!("{jwt}~")).unwrap();
    assert!(sd_jwt.disclosures().is_empty());
    assert_eq!(sd_jwt.to_string(), format!("{jwt}~"));
  }

  #[test]
  fn empty_disclosure_segments_are_rejected() {
    let jwt = SD_JWT.split('~').next().unwrap();
    let doubled = format!("{jwt}~~");
    assert!(matches!(SdJwt::parse(&doubled), Err(Error::MalformedCompact(_))));
  }

  #[test]
  fn empty_issuer_jws_is_rejected() {
    assert!(matches!(SdJwt::parse("~"), Err(Error::MalformedCompact(_))));
  }

  #[test]
  fn sd_hash_input_covers_everything_up_to_the_last_separator() {
    let sd_jwt = SdJwt::parse(SD_JWT).unwrap();
    assert_eq!(sd_jwt.sd_hash_input(), SD_JWT);
  }
}
