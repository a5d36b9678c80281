pub mod walk;

pub use walk::{scan, ScanFilter};
