//! Deploy stages that need more than a single transport call

pub mod fetch;
pub mod launch;
