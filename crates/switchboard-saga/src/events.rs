//! The event trait sagas are driven by.

/// A unit of input the saga orchestrator is driven by.
///
/// Application code typically defines one enum per saga type
/// (`OrderSagaEvent::Start(..)`, `::Step(..)`, `::Complete(..)`)
/// implementing this trait. `event_type` is matched against the saga
/// definition's `(state, event type)` transition table; `correlation_id`
/// identifies which saga instance the event belongs to.
pub trait SagaEvent: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Discriminant matched against the saga definition's transition table.
    /// A `&'static str` rather than an owned `String` since it identifies a
    /// fixed set of variants known at compile time.
    fn event_type(&self) -> &'static str;

    /// Identifies which saga instance this event belongs to.
    fn correlation_id(&self) -> &str;
}
