// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::method::{Flow, Method, MethodContext, MethodError};
use ax_core::{source_hash, MethodSpec, OptionSpec, OptionType, Phase};
use serde_json::Value;

/// Fails on purpose in the phase named by its `phase` option. In analyze
/// only slice 0 fails.
pub struct Fail;

impl Fail {
    fn fail_in(ctx: &MethodContext, phase: Phase) -> Result<(), MethodError> {
        let wanted: Phase = ctx.option("phase")?;
        if wanted == phase {
            return Err(MethodError::Failed(ctx.option("message")?));
        }
        Ok(())
    }
}

impl Method for Fail {
    fn spec(&self) -> MethodSpec {
        MethodSpec::new("fail", source_hash(include_str!("fail.rs")))
            .with_option(
                OptionSpec::new("phase", OptionType::one_of(["prepare", "analyze", "synthesize"]))
                    .default_value("synthesize"),
            )
            .with_option(OptionSpec::new("message", OptionType::NonEmptyStr).default_value("failed on request"))
            .with_description("fails in the requested phase")
    }

    fn prepare(&self, ctx: &MethodContext) -> Result<Flow, MethodError> {
        Self::fail_in(ctx, Phase::Prepare)?;
        Ok(Flow::Continue(Value::Null))
    }

    fn analyze(&self, ctx: &MethodContext, slice: u32, _: &Value) -> Result<Flow, MethodError> {
        if slice == 0 {
            Self::fail_in(ctx, Phase::Analyze)?;
        }
        Ok(Flow::Continue(Value::Null))
    }

    fn synthesize(&self, ctx: &MethodContext, _: &Value, _: &[Value]) -> Result<Value, MethodError> {
        Self::fail_in(ctx, Phase::Synthesize)?;
        Ok(Value::Null)
    }
}
