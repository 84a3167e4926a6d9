//! # kook-gateway
//!
//! Real-time side of the client. A [`GatewaySession`] keeps one socket
//! connection alive (handshake, heartbeat, resume or re-identify, backoff),
//! the [`EventRouter`] applies each dispatch to the shared
//! [`EntityCache`](kook_cache::EntityCache) and the [`EventBus`] fans the
//! resulting [`ClientEvent`]s out to subscriber groups.
//!
//! [`KookClient`] ties these together with the REST
//! [`RequestQueue`](kook_rest::RequestQueue).

pub mod bus;
pub mod client;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;

pub use bus::{EventBus, EventSubscription};
pub use client::{ClientContext, KookClient};
pub use connection::ConnectionState;
pub use error::{GatewayError, GatewayResult, ProtocolError, TransportError};
pub use events::{ClientEvent, DispatchEvent, GatewayEventType};
pub use router::EventRouter;
pub use session::{GatewaySession, SessionHandle};
pub use transport::{GatewayConnector, TransportMessage, WebSocketConnector};
