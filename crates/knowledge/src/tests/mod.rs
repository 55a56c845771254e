//! Crate-level tests: shared fakes and end-to-end pipeline scenarios.
