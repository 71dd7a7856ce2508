// SPDX-License-Identifier: MIT OR Apache-2.0
//! Call Logger (C10, spec §4.10): the per-call audit record shape, a
//! fluent builder, the special-arg extraction and output-truncation
//! helpers that feed it, and fire-and-forget delivery.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod logger;
mod record;

pub use builder::CallLogBuilder;
pub use logger::{CallLogger, InMemoryCallLogger};
pub use record::{extract_call_fields, payload_size_bytes, truncate_output, CallLogRecord, ExtractedCallFields};
