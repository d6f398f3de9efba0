//! Proptest strategies for fleet-sync records and timings.

use proptest::prelude::*;
use std::time::Duration;

/// Vehicle identifiers drawn from a small pool so upserts collide
pub fn vehicle_id_strategy() -> impl Strategy<Value = String> {
    (0u8..16).prop_map(|n| format!("vehicle-{n:02}"))
}

/// Base backoff delays from 1ms to 10s
pub fn base_delay_strategy() -> impl Strategy<Value = Duration> {
    (1u64..10_000).prop_map(Duration::from_millis)
}

/// Clock movements in seconds, including moves backwards
pub fn clock_step_strategy() -> impl Strategy<Value = i64> {
    -600i64..3_600
}

/// One correlator operation
#[derive(Debug, Clone)]
pub enum UpsertOp {
    Telemetry(String),
    Assignment(String),
}

pub fn upsert_op_strategy() -> impl Strategy<Value = UpsertOp> {
    prop_oneof![
        vehicle_id_strategy().prop_map(UpsertOp::Telemetry),
        vehicle_id_strategy().prop_map(UpsertOp::Assignment),
    ]
}

/// Sequences of call outcomes for a circuit breaker, `true` meaning success
pub fn outcome_sequence_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..64)
}
