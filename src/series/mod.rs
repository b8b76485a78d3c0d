//! In-memory storage for the realtime window and the bar series.

pub mod bars;
pub mod buffer;

pub use bars::{BarStore, StoredBar};
pub use buffer::SampleBuffer;
