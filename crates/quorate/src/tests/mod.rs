//! Crate-level tests that exercise sessions end to end.

pub(crate) mod support;
