//! Wire types for the unimail API.
//!
//! - `Template`, `RenderOptions`: template listing and rendering
//! - `SessionGrant`, `ServerMessage`: session creation responses

pub mod session;
pub mod template;

pub use session::{MessageLevel, ServerMessage, SessionGrant};
pub use template::{RenderOptions, Template};
