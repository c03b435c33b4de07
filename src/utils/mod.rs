//! Small text helpers shared by prompts, engines and logging

pub mod text;

pub use text::{bulleted, preview};
