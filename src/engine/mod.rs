// SPDX-License-Identifier: MIT

//! Evaluation kit: attribute-path lookup and the expression language.
//!
//! Everything in here is pure and synchronous; the service layer in
//! `crate::warden` feeds it in-memory attribute trees.

pub mod expr;
pub mod lookup;
