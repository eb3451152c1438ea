//! Test helpers for service tests
//!
//! An in-memory [`FakeAuthority`] that records every upstream call, plus fixture keys
//! for minting bound tokens.

pub mod fake_authority;
pub mod fixtures;

pub use fake_authority::{object_id_for, FakeAuthority, RecordedCall, ScriptedFailure};
pub use fixtures::*;
