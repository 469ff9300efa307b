//! Realtime record store
//!
//! A hierarchical key/value tree with push subscriptions, disconnect hooks and atomic
//! multi-path writes. [`RecordStore`] is the backend seam; [`RecordRepository`] groups the
//! message, location and presence repositories built on it.

pub mod geo;
pub mod memory;
pub mod messages;
pub mod path;
pub mod presence;
pub mod push_id;
pub mod repository;
pub mod store;
pub mod types;

pub use geo::GeoRepository;
pub use memory::InMemoryRecordStore;
pub use messages::MessageRepository;
pub use path::NodePath;
pub use presence::PresenceRepository;
pub use push_id::PushIdGenerator;
pub use repository::RecordRepository;
pub use store::{
    RecordErrorCode, RecordLimit, RecordOrder, RecordQuery, RecordStore, RecordStoreError,
    ValueEvent,
};
pub use types::{Conversation, ConversationType, GeoLocation, Message, MessageStatus, PresenceState};
