//! Provider webhook handlers.

mod reconcile_provider_event;

pub use reconcile_provider_event::{
    ReconcileProviderEventCommand, ReconcileProviderEventHandler, ReconcileProviderEventResult,
};
