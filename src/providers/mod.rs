//! Providers Module - External Data Sources
//!
//! Everything that talks to upstreams: the transport seam, the sequential
//! fallback engine, Pact nodes and the secondary indexer/explorer.

pub mod fallback;
pub mod indexer;
pub mod mock;
pub mod pact;
pub mod transport;

pub use fallback::FallbackQueryEngine;
pub use indexer::{is_contract_address, IndexerClient};
pub use mock::MockTransport;
pub use pact::{normalize_balance, PactClient, ShardQueryResult};
pub use transport::{HttpMethod, HttpRequest, HttpTransport, ReqwestTransport};
