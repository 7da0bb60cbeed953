//! Conference entities: session states, participants and text payloads.

pub mod message;
pub mod participant;
pub mod state;

pub use message::{
    ChannelTextMessage, DirectMessage, Presence, PresenceStatus, TranscribedMessage,
    sort_chronologically,
};
pub use participant::{Participant, ParticipantUpdate};
pub use state::{ConnectionRecoveryState, ConnectionState, LoginState, TransmissionMode};
