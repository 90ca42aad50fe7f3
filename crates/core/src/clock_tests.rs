// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_is_after_2020() {
    assert!(SystemClock.epoch_ms() > 1_577_836_800_000);
}

#[test]
fn fake_clock_starts_at_fixed_epoch() {
    assert_eq!(FakeClock::new().epoch_ms(), FakeClock::START_MS);
}

#[test]
fn fake_clock_advance_is_shared_between_clones() {
    let clock = FakeClock::new();
    let other = clock.clone();
    other.advance(Duration::from_secs(2));
    assert_eq!(clock.epoch_ms(), FakeClock::START_MS + 2_000);
}

#[test]
fn fake_clock_set_overrides() {
    let clock = FakeClock::default();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}
