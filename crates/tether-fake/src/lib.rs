//! Tether Fake
//!
//! In-memory doubles of the control plane for tests.
//!
//! [`FakeControlPlane`] implements every capability trait over one shared
//! state. It records an ordered trace of calls, exposes the set of objects
//! it currently holds as a comparable snapshot, and can be told to fail or
//! stall a given operation. [`FakeIdentityConnector`] scripts the identity
//! provider used by credential resolution.

mod control_plane;
mod identity;

pub use control_plane::{
  Call, FakeControlPlane, FakeMapping, FakeRule, FakeSubscription, TEST_ACCOUNT, TEST_REGION,
};
pub use identity::{FakeIdentityConnector, IdentityCall};
