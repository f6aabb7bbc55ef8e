//! Prescriptions service integration tests.

mod support;
mod handlers;
mod training;

#[cfg(feature = "http")]
mod http;
