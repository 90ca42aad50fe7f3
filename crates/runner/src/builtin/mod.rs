// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Methods built into `axd`.
//!
//! Each method's source hash is the hash of its own source file, so editing
//! a method invalidates the jobs it built.

mod concat;
mod crash;
mod echo;
mod fail;
mod fanout;
mod sleep;
mod slice_sum;

pub use concat::Concat;
pub use crash::Crash;
pub use echo::Echo;
pub use fail::Fail;
pub use fanout::Fanout;
pub use sleep::Sleep;
pub use slice_sum::SliceSum;

use crate::registry::{MethodRegistry, RegistryError};

/// A registry holding every built-in method.
pub fn registry() -> Result<MethodRegistry, RegistryError> {
    let mut registry = MethodRegistry::new();
    registry.register(Echo)?;
    registry.register(SliceSum)?;
    registry.register(Concat)?;
    registry.register(Fail)?;
    registry.register(Crash)?;
    registry.register(Sleep)?;
    registry.register(Fanout)?;
    Ok(registry)
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
