pub mod bootstrap;
pub mod session;

pub use bootstrap::{history, http_fetcher, watch, WatchOptions};
pub use session::{ChartSession, Overlays};
