// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process caches shared across a request: the content-addressed code
//! cache (C6), the permission cache (the caching half of C3), and the
//! session sequencer (C11).
#![deny(unsafe_code)]

mod code_cache;
mod permission_cache;
mod sequencer;

pub use code_cache::{CodeCache, CodeCacheEntry, CANDIDATE_FILENAMES};
pub use permission_cache::PermissionCache;
pub use sequencer::SessionSequencer;
