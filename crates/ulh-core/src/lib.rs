// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared domain types for the Ultralight MCP host: users, bearer
//! credentials, apps, and permission rows. Every other crate in the
//! workspace builds on these.
#![deny(unsafe_code)]

mod app;
mod permission;
mod user;

pub use app::{
    App, AppRateLimitConfig, EnvScope, EnvSchemaEntry, ManifestFunction, PricingConfig, Visibility,
};
pub use permission::{
    ArgScalar, BudgetPeriod, PermissionRow, PermissionSet, ResolvedPermissions, TimeWindow,
};
pub use user::{ApiTokenRecord, Tier, TokenScope, User, VerifiedCaller};
