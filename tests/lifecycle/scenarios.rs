//! BDD scenarios for the hypervisor lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Built-in backend installs the canonical preference"
)]
fn scenario_builtin_preference(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Unknown backend type is rejected"
)]
fn scenario_unknown_backend(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Custom backend may reorder the preference"
)]
fn scenario_custom_reorder(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Custom backend may not redefine the preference"
)]
fn scenario_custom_redefine(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Enabled configuration steps run in fixed order"
)]
fn scenario_fixed_order(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Parallel time sync waits for every host before failing"
)]
fn scenario_parallel_timesync(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}
