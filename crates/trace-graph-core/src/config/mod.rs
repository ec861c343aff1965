//! Validation-run configuration.

mod val;

#[cfg(test)]
mod tests;

pub use val::{checked_image_size, ValArgs, ValOverrides, ValPhase};
