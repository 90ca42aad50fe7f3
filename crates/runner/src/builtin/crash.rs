// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::method::{Flow, Method, MethodContext, MethodError};
use ax_core::{source_hash, MethodSpec, OptionSpec, OptionType, Phase};
use serde_json::Value;

/// Aborts the worker process of slice `slice` mid-analyze.
pub struct Crash;

impl Method for Crash {
    fn spec(&self) -> MethodSpec {
        MethodSpec::new("crash", source_hash(include_str!("crash.rs")))
            .with_option(OptionSpec::new("slice", OptionType::Int).default_value(0))
            .with_phases(&[Phase::Analyze, Phase::Synthesize])
            .with_description("kills one analyze worker")
    }

    fn analyze(&self, ctx: &MethodContext, slice: u32, _: &Value) -> Result<Flow, MethodError> {
        let target: u32 = ctx.option("slice")?;
        if slice == target {
            tracing::error!(slice, "crashing on request");
            std::process::abort();
        }
        Ok(Flow::Continue(Value::from(slice)))
    }

    fn synthesize(&self, _: &MethodContext, _: &Value, analyzed: &[Value]) -> Result<Value, MethodError> {
        Ok(Value::from(analyzed.to_vec()))
    }
}
