// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Selective Disclosure JWTs (SD-JWT) per RFC 9901: disclosure
//! construction, selective blinding of object properties and array
//! elements, compact serialization, issuer signing, holder presentation
//! with Key Binding, verifier reconstruction, and the SD-JWT VC profile.
//!
//! Keys never enter this crate: signing, signature verification and key
//! resolution are host capabilities supplied through the [`JwsSigner`],
//! [`JwsVerifier`] and [`KeyResolver`] traits.

mod builder;
mod decoder;
mod directive;
mod disclosure;
mod encoder;
mod error;
mod hasher;
mod jwt;
mod key_binding_jwt_claims;
mod presenter;
mod sd_jwt;
mod signer;
mod utils;
mod vc;
mod verifier;

pub use builder::*;
pub use decoder::*;
pub use directive::*;
pub use disclosure::*;
pub use encoder::*;
pub use error::*;
pub use hasher::*;
pub use jwt::*;
pub use key_binding_jwt_claims::*;
pub use presenter::*;
pub use sd_jwt::*;
pub use signer::*;
pub use vc::*;
pub use verifier::*;
pub(crate) use utils::*;
