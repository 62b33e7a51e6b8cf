//! CLI argument definitions

mod args;

pub use args::{Args, ClassifierKind, Command, RecordArgs, ReplayArgs};
