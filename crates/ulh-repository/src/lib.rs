// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed repository traits standing between the host's admission chain and
//! the relational store / object store / secret store backing it (Design
//! Notes §9 "Relational-store RPC coupling"). Every trait here is narrow
//! enough to mock; [`memory::InMemoryStore`] implements all of them for
//! tests and local development.
#![deny(unsafe_code)]

mod traits;

pub mod memory;

pub use traits::{
    AppRepository, ApiTokenRepository, BalanceLedger, ObjectStore, PermissionRepository,
    ProfileRepository, RepositoryError, SecretStore, TransferOutcome, UserProfile,
    UserRepository,
};
