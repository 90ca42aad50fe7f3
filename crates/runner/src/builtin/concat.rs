// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::method::{Method, MethodContext, MethodError};
use ax_core::{source_hash, MethodSpec, OptionSpec, OptionType, Phase, SlotArity};
use serde_json::Value;

/// Collects the results of the jobs bound to `inputs`, in order.
pub struct Concat;

impl Method for Concat {
    fn spec(&self) -> MethodSpec {
        MethodSpec::new("concat", source_hash(include_str!("concat.rs")))
            .with_option(OptionSpec::new("label", OptionType::Str).default_value(""))
            .with_job_slot("inputs", SlotArity::List)
            .with_phases(&[Phase::Synthesize])
            .with_description("list of the results of its inputs")
    }

    fn synthesize(&self, ctx: &MethodContext, _: &Value, _: &[Value]) -> Result<Value, MethodError> {
        let mut results = Vec::new();
        for job in ctx.jobs("inputs") {
            ctx.check_cancelled()?;
            results.push(ctx.load_result(job)?);
        }
        let label: String = ctx.option("label")?;
        Ok(serde_json::json!({ "label": label, "results": results }))
    }
}
