// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::method::{Flow, Method, MethodContext, MethodError};
use ax_core::{source_hash, MethodSpec, OptionSpec, OptionType, Phase};
use serde_json::Value;

/// Sums `0..n`, each slice taking every `slices`-th number.
pub struct SliceSum;

impl SliceSum {
    pub fn partial(n: i64, slice: u32, slices: u32) -> i64 {
        (0..n).skip(slice as usize).step_by(slices.max(1) as usize).sum()
    }
}

impl Method for SliceSum {
    fn spec(&self) -> MethodSpec {
        MethodSpec::new("slice_sum", source_hash(include_str!("slice_sum.rs")))
            .with_option(OptionSpec::new("n", OptionType::Int).default_value(100))
            .with_phases(&[Phase::Analyze, Phase::Synthesize])
            .with_description("sum of 0..n, computed across slices")
    }

    fn analyze(&self, ctx: &MethodContext, slice: u32, _: &Value) -> Result<Flow, MethodError> {
        let n: i64 = ctx.option("n")?;
        let sum = Self::partial(n, slice, ctx.slices());
        ctx.progress(format!("partial sum {sum}"));
        Ok(Flow::Continue(Value::from(sum)))
    }

    fn synthesize(&self, _: &MethodContext, _: &Value, analyzed: &[Value]) -> Result<Value, MethodError> {
        let mut total = 0i64;
        for part in analyzed {
            total += part.as_i64().ok_or_else(|| MethodError::failed(format!("bad partial sum {part}")))?;
        }
        Ok(serde_json::json!({ "sum": total, "parts": analyzed.len() }))
    }
}
