// Subscription module.
// Cache-backed subscriptions with background refresh and teardown.

pub mod controller;
pub mod fetch;
pub mod state;

pub use controller::{Payload, SubscriptionConfig, SubscriptionController};
pub use fetch::{Fetch, Filter};
pub use state::{Phase, SubscriptionState};
