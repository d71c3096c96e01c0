pub mod capabilities;
pub mod chat;
pub mod collection;
pub mod error;
pub mod identifier;
pub mod model;

pub use capabilities::{Capabilities, ModelType};
pub use chat::{Message, MessageRole, ToolCall};
pub use collection::{Artifact, Collection};
pub use error::{DepotError, Result};
pub use identifier::{Identifier, Registry};
pub use model::{DownloadState, Model, RuntimeState, RuntimeStatus};
