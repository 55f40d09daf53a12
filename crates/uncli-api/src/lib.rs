// uncli-api: UniFi OS controller session and Consul KV client

pub mod consul;
pub mod device;
pub mod error;
pub mod session;
pub mod transport;

pub use consul::{ConsulConfig, ConsulKv};
pub use device::Device;
pub use error::{Error, SessionError};
pub use reqwest::StatusCode;
pub use session::{Credentials, Session, SessionConfig, StationCommand};
pub use transport::{TlsMode, TransportConfig};
