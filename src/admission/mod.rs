//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → key.rs (derive caller key, anonymous fallback)
//!     → policy.rs (evaluate against per-key state)
//!         → store.rs (get or create entry, per-key guard)
//!         → window.rs (fixed-window count, reject over limit)
//!         → delay.rs (progressive slowdown past threshold)
//!     → Verdict: Allow | AllowWithDelay(d) | Reject(reason)
//!
//! Background:
//!     sweeper.rs → store.rs (evict idle entries)
//! ```
//!
//! # Design Decisions
//! - All window arithmetic takes `now` as a parameter; only `Clock` reads time
//! - The counter and the slowdown keep separate window starts and durations
//! - State lives in one owned store per policy, never in a global
//! - Delays are uncapped unless explicitly configured

pub mod clock;
pub mod delay;
pub mod key;
pub mod policy;
pub mod store;
pub mod sweeper;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delay::{DelayAccumulator, DelayState};
pub use key::{ClientIpExtractor, Key, KeyExtractor};
pub use policy::{Admission, AdmissionPolicy, Quota, RejectReason, Verdict};
pub use store::{PerKeyEntry, StateStore, StoreError};
pub use sweeper::EvictionSweeper;
pub use window::{WindowCounter, WindowOutcome, WindowState};
