use crate::transaction::Transaction;
use serde::Serialize;

/// Entity identity plus the ids of the active trace, as attached to every
/// enriched log line.
///
/// `trace_id` and `span_id` are empty outside of a unit of work. A fresh
/// snapshot is taken for every log call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkingMetadata {
    #[serde(rename = "entity.name")]
    pub entity_name: String,
    #[serde(rename = "entity.type")]
    pub entity_type: String,
    #[serde(rename = "entity.guid")]
    pub entity_guid: String,
    #[serde(rename = "trace.id")]
    pub trace_id: String,
    #[serde(rename = "span.id")]
    pub span_id: String,
    pub hostname: String,
}

impl LinkingMetadata {
    pub fn has_trace(&self) -> bool {
        !self.trace_id.is_empty()
    }
}

/// Invoked once when a unit of work ends.
pub type TransactionEndHook = Box<dyn Fn(&Transaction) + Send + Sync>;

/// What the enrichment core needs from the tracing subsystem.
pub trait LinkingContext: Send + Sync {
    /// The unit of work the calling code is currently inside, if any.
    /// A unit of work that has already ended is never returned.
    fn active_transaction(&self) -> Option<Transaction>;

    /// Linking metadata for the given unit of work, or entity-only
    /// metadata when `transaction` is `None`.
    fn linking_metadata(&self, transaction: Option<&Transaction>) -> LinkingMetadata;

    /// Register a hook that runs when any unit of work ends.
    fn on_transaction_end(&self, hook: TransactionEndHook);

    fn current_linking_metadata(&self) -> LinkingMetadata {
        self.linking_metadata(self.active_transaction().as_ref())
    }
}
