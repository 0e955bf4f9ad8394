//! Server configuration.

/// Configuration for the reference log server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of updates per diff page.
    pub page_size: usize,
    /// Capacity of each subscriber's frame channel. A subscriber that
    /// falls further behind than this is dropped, as a real push
    /// connection would be.
    pub subscriber_capacity: usize,
}

impl ServerConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            page_size: 100,
            subscriber_capacity: 256,
        }
    }

    /// Sets the diff page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the subscriber channel capacity.
    pub fn with_subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.subscriber_capacity, 256);
    }

    #[test]
    fn builder() {
        let config = ServerConfig::new()
            .with_page_size(2)
            .with_subscriber_capacity(8);
        assert_eq!(config.page_size, 2);
        assert_eq!(config.subscriber_capacity, 8);
    }
}
