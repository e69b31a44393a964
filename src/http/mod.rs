//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1 with upgrades, one task per connection)
//!     → routing::Dispatcher
//!         → intercept.rs (plain HTTP: capture, persist, forward, relay)
//!             → request.rs   (snapshot + outbound copy)
//!             → transport.rs (origin round trip)
//!             → response.rs  (snapshot + client response)
//!         → tunnel.rs (CONNECT: hijack, dial, pump bytes)
//! ```

pub mod intercept;
pub mod request;
pub mod response;
pub mod server;
pub mod transport;
pub mod tunnel;

pub use intercept::Interceptor;
pub use request::CapturedRequest;
pub use response::CapturedResponse;
pub use server::ProxyServer;
pub use transport::{HyperTransport, OutboundTransport, TransportError};
pub use tunnel::TargetAuthority;
