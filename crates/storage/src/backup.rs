// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;
use std::path::{Path, PathBuf};

const MAX_BAK_FILES: u32 = 3;

/// Next free backup path for `path`: `.bak`, then `.bak.2`, `.bak.3`.
///
/// Older backups shift up one slot; the oldest is dropped at the limit.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let name = |n: u32| {
        let mut os = path.as_os_str().to_owned();
        if n == 1 {
            os.push(".bak");
        } else {
            os.push(format!(".bak.{n}"));
        }
        PathBuf::from(os)
    };

    let oldest = name(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = name(n);
        if src.exists() {
            let _ = fs::rename(&src, name(n + 1));
        }
    }
    name(1)
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
