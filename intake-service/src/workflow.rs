use care_flow::{Notifier, SessionRegistry};

use crate::config::ServiceConfig;
use crate::flows::{DispatchWorkflow, TriageWorkflow, VerificationWorkflow};

pub fn build_dispatch_workflow(config: &ServiceConfig) -> DispatchWorkflow {
    DispatchWorkflow {
        eta_minutes: config.eta_minutes.clone(),
        eta_tick: config.eta_tick,
        ..DispatchWorkflow::default()
    }
}

pub fn create_triage_registry(
    config: &ServiceConfig,
    notifier: Notifier,
) -> SessionRegistry<TriageWorkflow> {
    SessionRegistry::new(TriageWorkflow, notifier, config.flow_config()).with_seed(config.rng_seed)
}

pub fn create_dispatch_registry(
    config: &ServiceConfig,
    notifier: Notifier,
) -> SessionRegistry<DispatchWorkflow> {
    SessionRegistry::new(build_dispatch_workflow(config), notifier, config.flow_config())
        .with_seed(config.rng_seed)
}

pub fn create_verification_registry(
    config: &ServiceConfig,
    notifier: Notifier,
) -> SessionRegistry<VerificationWorkflow> {
    SessionRegistry::new(VerificationWorkflow, notifier, config.flow_config())
        .with_seed(config.rng_seed)
}
