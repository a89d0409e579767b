pub mod controller;

pub use controller::{MVCCController, WriterGuard, WriterSlot};
