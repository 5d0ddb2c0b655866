// SPDX-License-Identifier: MIT

//! Appeal lifecycle engine: policies, appeals, approvals, and the
//! services that move them through their state machines.

pub mod appeal;
pub mod approval;
pub mod audit;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod identity;
pub mod jobs;
pub mod notifier;
pub mod policy;
pub mod provider;
pub mod server;
pub mod store;
