//! Plan catalog domain.
//!
//! Pure, I/O-free description of the plans a subscription can be on.

mod plan;
mod plan_catalog;

pub use plan::{BillingInterval, Plan, PlanId};
pub use plan_catalog::{PlanCatalog, PriceComparison};
