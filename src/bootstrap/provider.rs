//! Ordered provider chains.

/// Something that may be able to produce a value, e.g. one candidate
/// location of a socket or an executable.
pub trait Provider {
    /// Value produced on success.
    type Output;

    /// Human readable description for logs.
    fn describe(&self) -> String;

    /// Try to produce the value.
    fn provide(&self) -> Option<Self::Output>;
}

/// Try providers in order and return the first value produced.
pub fn first_available<T>(providers: &[Box<dyn Provider<Output = T>>]) -> Option<T> {
    providers.iter().find_map(|provider| {
        let value = provider.provide();
        if value.is_none() {
            tracing::debug!("No match from {}", provider.describe());
        }
        value
    })
}
