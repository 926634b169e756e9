//! Synthesis engine internals

pub(crate) mod channel;
pub(crate) mod note;
pub(crate) mod operator;
pub(crate) mod resampler;
