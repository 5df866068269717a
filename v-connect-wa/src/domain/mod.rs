pub mod api;
pub mod contact;
pub mod event;
pub mod instance;
pub mod jid;
pub mod message;

pub use contact::{ContactInfo, ContactProfile, GroupMetadata, PictureTier};
pub use event::{InstanceEvent, ManagerEvent, RealtimeFrame};
pub use instance::{Instance, InstanceStatus};
pub use message::{MessageContent, MessageEnvelope};
