// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::method::{Method, MethodContext, MethodError};
use ax_core::{source_hash, MethodSpec, OptionSpec, OptionType, Phase};
use serde_json::Value;

/// Returns its `value` option as the job result.
pub struct Echo;

impl Method for Echo {
    fn spec(&self) -> MethodSpec {
        MethodSpec::new("echo", source_hash(include_str!("echo.rs")))
            .with_option(OptionSpec::new("value", OptionType::Any))
            .with_phases(&[Phase::Synthesize])
            .with_description("returns its value option")
    }

    fn synthesize(&self, ctx: &MethodContext, _: &Value, _: &[Value]) -> Result<Value, MethodError> {
        ctx.option("value")
    }
}
