// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::method::{Method, MethodContext, MethodError};
use ax_core::{source_hash, JobRequest, MethodSpec, OptionSpec, OptionType, Phase};
use serde_json::Value;

/// Builds one `echo` subjob per entry of `values` and collects their results.
pub struct Fanout;

impl Method for Fanout {
    fn spec(&self) -> MethodSpec {
        MethodSpec::new("fanout", source_hash(include_str!("fanout.rs")))
            .with_option(
                OptionSpec::new("values", OptionType::List { item: Box::new(OptionType::Any) })
                    .default_value(Value::Array(Vec::new())),
            )
            .with_phases(&[Phase::Synthesize])
            .with_description("echo subjob per value, results in order")
    }

    fn synthesize(&self, ctx: &MethodContext, _: &Value, _: &[Value]) -> Result<Value, MethodError> {
        let values: Vec<Value> = ctx.option("values")?;
        let subjobs = ctx.subjobs()?;
        let mut results = Vec::with_capacity(values.len());
        for value in values {
            ctx.check_cancelled()?;
            let job = subjobs.build(JobRequest::new("echo").option("value", value))?;
            results.push(ctx.load_result(&job)?);
        }
        Ok(Value::Array(results))
    }
}
