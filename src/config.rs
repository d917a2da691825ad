use crate::tokens::DEFAULT_TOKEN_CAPACITY;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for a [`CamillaClient`](crate::CamillaClient)
///
/// # Example
///
/// ```
/// use camilladsp_client::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::default()
///     .with_request_timeout(Some(Duration::from_secs(2)))
///     .with_token_capacity(512);
/// assert_eq!(options.token_capacity, 512);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// How long to wait for a reply; `None` waits as long as the connection is open
    pub request_timeout: Option<Duration>,

    /// Maximum number of JSON tokens accepted in a single reply
    pub token_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            token_capacity: DEFAULT_TOKEN_CAPACITY,
        }
    }
}

impl ClientOptions {
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Replies with many channels or device types need more tokens
    pub fn with_token_capacity(mut self, capacity: usize) -> Self {
        self.token_capacity = capacity;
        self
    }
}
