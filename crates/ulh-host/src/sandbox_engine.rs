// SPDX-License-Identifier: MIT OR Apache-2.0
//! The actual runtime that executes app code is out of scope for this host
//! (spec §1 Non-goals: "the sandbox engine itself"); [`UnimplementedSandboxEngine`]
//! is a placeholder that always reports failure, standing in for whatever
//! process-isolated runtime a deployment plugs in via [`SandboxEngine`].

use std::sync::Arc;

use async_trait::async_trait;
use ulh_capability::CapabilitySurface;
use ulh_sandbox::{EngineResult, SandboxEngine, SandboxInvocation};

pub struct UnimplementedSandboxEngine;

#[async_trait]
impl SandboxEngine for UnimplementedSandboxEngine {
    async fn run(&self, invocation: SandboxInvocation, _surface: Arc<CapabilitySurface>) -> EngineResult {
        EngineResult {
            success: false,
            result: None,
            error: Some(format!(
                "no sandbox runtime configured to execute '{}'",
                invocation.function_name
            )),
            logs: Vec::new(),
            ai_cost_cents: 0,
        }
    }
}
