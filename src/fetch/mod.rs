use crate::error::Result;

pub mod decode;
pub mod instrument;
pub mod poller;
pub mod request;
pub mod source;

pub use decode::{parse_history_payload, parse_realtime, HistoryBatch};
pub use instrument::InstrumentId;
pub use poller::{FeedEvent, FeedEvents, FetchState, Fetcher, Outcome, RequestKind};
pub use request::HistoryQuery;
pub use source::{HttpQuoteSource, QuoteSource};

pub type FetchResult<T> = Result<T>;
