//! Cross-context messaging
//!
//! - protocol: the typed request/response/push contract
//! - dispatcher: the content side, answering requests against a page
//! - transport: the requesting side, with timeouts and one injection-retry
//! - background: auto apply driven by content pushes
//! - native: Chrome native messaging framing for the stdio host

pub mod background;
pub mod dispatcher;
pub mod native;
pub mod protocol;
pub mod transport;

pub use background::{Autopilot, AutopilotAction};
pub use dispatcher::Dispatcher;
pub use protocol::{Outbound, Push, Request, Response, contract_schema};
pub use transport::{ExtensionClient, Injector, LocalTransport, Transport};
