//! External information sources used by the researcher.
//!
//! - [`search`](crate::tools::search) - web search adapters (DuckDuckGo, Tavily)

/// Web search adapters.
pub mod search;

pub use search::{SearchHit, WebSearch};
