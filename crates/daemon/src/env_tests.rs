// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn parses_runtime_list() {
    let runtimes = parse_runtimes("default=/usr/bin/axd; py = /opt/ax/py-runtime ;").unwrap();
    assert_eq!(
        runtimes,
        vec![
            ("default".to_string(), PathBuf::from("/usr/bin/axd")),
            ("py".to_string(), PathBuf::from("/opt/ax/py-runtime")),
        ]
    );
}

#[parameterized(
    no_equals = { "default" },
    empty_name = { "=/usr/bin/axd" },
    empty_program = { "default=" },
)]
fn rejects_bad_runtime_entry(raw: &str) {
    assert!(matches!(parse_runtimes(raw), Err(LifecycleError::Config(_))));
}

#[parameterized(
    single = { "default", &["default"] },
    several = { "a, b,c", &["a", "b", "c"] },
    blanks = { " ,a,, ", &["a"] },
    empty = { "", &[] },
)]
fn parses_workdir_list(raw: &str, expected: &[&str]) {
    assert_eq!(parse_list(raw), expected);
}
