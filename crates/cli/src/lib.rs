//! Library half of the CLI: configuration-to-runtime wiring shared by the binary and tests.
pub mod wiring;
