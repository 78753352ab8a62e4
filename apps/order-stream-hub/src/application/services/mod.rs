//! Application Services
//!
//! Transport-independent services that implement the hub's observable
//! behavior. The gateway adapter drives them from parsed client
//! requests; every message they emit flows through the session
//! registry's delivery seam.
//!
//! - [`SessionRegistry`]: live sessions, user bindings, outbound queues
//! - [`AuthService`]: login, role-derived topic enrollment
//! - [`SubscriptionService`]: per-stock topic joins and leaves
//! - [`BroadcastEngine`]: three-step order update fan-out

pub mod auth;
pub mod broadcast;
pub mod registry;
pub mod subscription;

pub use auth::{AuthError, AuthService, LoginOutcome};
pub use broadcast::{BroadcastEngine, FanOutReport};
pub use registry::{DeliveryOutcome, RegistryStats, SessionRegistry};
pub use subscription::{SubError, SubscriptionService};
