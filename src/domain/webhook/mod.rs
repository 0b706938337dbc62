//! Provider webhook domain: event envelope, signature verification, errors.

mod errors;
mod provider_event;
mod verifier;

pub use errors::{SignatureFailure, WebhookError};
pub use provider_event::{
    CheckoutSession, Invoice, InvoiceLine, InvoiceLines, LinePeriod, PriceRef, ProviderEvent,
    ProviderEventData, ProviderEventKind, ProviderSubscription,
};
pub use verifier::{
    SignatureHeader, WebhookVerifier, DEFAULT_MAX_AGE_SECS, DEFAULT_MAX_FUTURE_SECS,
};
