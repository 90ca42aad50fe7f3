// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::method::{Flow, Method, MethodContext, MethodError};
use ax_core::{source_hash, MethodSpec, OptionSpec, OptionType, Phase};
use serde_json::Value;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(20);

/// Every slice sleeps `ms` milliseconds, checking for cancellation.
pub struct Sleep;

impl Method for Sleep {
    fn spec(&self) -> MethodSpec {
        MethodSpec::new("sleep", source_hash(include_str!("sleep.rs")))
            .with_option(OptionSpec::new("ms", OptionType::Int).default_value(1000))
            .with_phases(&[Phase::Analyze])
            .with_description("sleeps in every slice")
    }

    fn analyze(&self, ctx: &MethodContext, _: u32, _: &Value) -> Result<Flow, MethodError> {
        let ms: u64 = ctx.option("ms")?;
        let until = Instant::now() + Duration::from_millis(ms);
        while Instant::now() < until {
            ctx.check_cancelled()?;
            std::thread::sleep(TICK.min(until.saturating_duration_since(Instant::now())));
        }
        Ok(Flow::Continue(Value::from(ms)))
    }
}
