//! Usage-control algorithms for tollgate.
//!
//! Three stateless components layered on the [`CounterStore`] contract:
//!
//! - [`RateLimiter`]: fixed-window request budgets per IP, user, and
//!   endpoint, with a combined coarse + burst window for IP checks.
//! - [`QuotaTracker`]: day-bucketed usage counters reset at UTC midnight.
//! - [`ConcurrencyGate`]: bounded-slot admission with TTL crash recovery.
//!
//! All coordination happens through the store; these types hold no mutable
//! state of their own and are cheap to clone.
//!
//! [`CounterStore`]: tollgate_store::CounterStore

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod gate;
pub mod quota;
pub mod rate;
pub mod window;

pub use gate::{Admission, ConcurrencyGate, SlotPermit};
pub use quota::QuotaTracker;
pub use rate::{Decision, RateLimitConfig, RateLimiter};
