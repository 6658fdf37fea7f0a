//! Crate-level tests exercising the facade and broker together.

pub(crate) mod support;
