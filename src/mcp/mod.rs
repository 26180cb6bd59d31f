pub mod client;
pub mod session;
pub mod tools;
pub mod transport;

pub use session::{with_session, McpSession};
pub use tools::{ToolArguments, ToolCallResult, ToolDescriptor, ToolSession};
pub use transport::SessionError;
