/// Shared surface of anything carried in a JSON event payload.
pub trait Eventlike: std::fmt::Debug + Send + Sync {
    /// The snake_case event type string (matches the serde `type` tag).
    fn event_type(&self) -> &'static str;
}
