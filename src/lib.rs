//! Interactive Arch Linux provisioning.
//!
//! The binary is a thin shell over [`stage::run`]. Everything that touches
//! the system goes through [`cmd::Gateway`], and everything that asks the
//! operator goes through [`prompt::Prompter`], so both can be replaced in
//! tests. The doubles live in `testing`, built only for tests or with the
//! `test-support` feature.

pub mod blockdev;
pub mod catalog;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod prompt;
pub mod stage;
pub mod steps;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod ui;
pub mod validate;
