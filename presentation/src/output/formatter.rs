//! Output formatter trait

use voxlink_application::ChannelUpdate;
use voxlink_domain::{
    AccountId, ChannelId, ChannelTextMessage, ConnectionState, LoginState, Participant,
};

/// Trait for rendering session activity as output lines
pub trait EventFormatter: Send + Sync {
    fn login_state(&self, account: &AccountId, state: LoginState) -> String;

    fn channel_state(&self, channel: &ChannelId, stream: &str, state: ConnectionState) -> String;

    fn update(&self, channel: &ChannelId, update: &ChannelUpdate) -> String;

    fn roster(&self, channel: &ChannelId, participants: &[Participant]) -> String;

    fn history(&self, channel: &ChannelId, messages: &[ChannelTextMessage]) -> String;

    fn error(&self, context: &str, error: &dyn std::fmt::Display) -> String;
}
