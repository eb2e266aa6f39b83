/// Data model for channels and the messages flowing through them.
pub mod channel;
pub mod message;

pub use channel::{Channel, ChannelId, Direction};
pub use message::{FileIdentity, FileObservation, Message};
