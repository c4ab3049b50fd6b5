pub mod citations;
pub mod history;
pub mod interaction_log;
pub mod query;
pub mod search_cache;

pub use citations::{substitute_citations, CitationStream};
pub use history::{ConversationHistory, ConversationTurn, TurnRole};
pub use interaction_log::{InteractionLogEntry, InteractionLogger, JsonlInteractionLogger};
pub use query::{QueryError, QueryEvent, QueryOutcome, QueryRequest, QueryService};
pub use search_cache::{
    record_search_results, ActiveCache, CacheScope, CachedItem, CachedResultSet, ResultCache,
};
