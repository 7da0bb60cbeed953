//! Line-delimited JSON output for scripting

use crate::output::formatter::EventFormatter;
use serde_json::{Value, json};
use voxlink_application::ChannelUpdate;
use voxlink_domain::{
    AccountId, ChannelId, ChannelTextMessage, ConnectionState, LoginState, Participant,
};

/// Formats session activity as one JSON object per line
pub struct JsonFormatter;

fn line(value: Value) -> String {
    value.to_string()
}

impl EventFormatter for JsonFormatter {
    fn login_state(&self, account: &AccountId, state: LoginState) -> String {
        line(json!({
            "event": "login_state",
            "account": account.to_uri(),
            "state": state.as_str(),
        }))
    }

    fn channel_state(&self, channel: &ChannelId, stream: &str, state: ConnectionState) -> String {
        line(json!({
            "event": "channel_state",
            "channel": channel.to_uri(),
            "stream": stream,
            "state": state.as_str(),
        }))
    }

    fn update(&self, channel: &ChannelId, update: &ChannelUpdate) -> String {
        let (event, payload) = match update {
            ChannelUpdate::ParticipantAdded(p) => ("participant_added", json!(p)),
            ChannelUpdate::ParticipantUpdated(p) => ("participant_updated", json!(p)),
            ChannelUpdate::ParticipantRemoved(p) => ("participant_removed", json!(p)),
            ChannelUpdate::MessageReceived(m) => ("message", json!(m)),
            ChannelUpdate::TranscriptionReceived(t) => ("transcription", json!(t)),
        };
        line(json!({
            "event": event,
            "channel": channel.to_uri(),
            "data": payload,
        }))
    }

    fn roster(&self, channel: &ChannelId, participants: &[Participant]) -> String {
        line(json!({
            "event": "roster",
            "channel": channel.to_uri(),
            "participants": participants,
        }))
    }

    fn history(&self, channel: &ChannelId, messages: &[ChannelTextMessage]) -> String {
        line(json!({
            "event": "history",
            "channel": channel.to_uri(),
            "messages": messages,
        }))
    }

    fn error(&self, context: &str, error: &dyn std::fmt::Display) -> String {
        line(json!({
            "event": "error",
            "context": context,
            "message": error.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxlink_domain::ChannelType;

    #[test]
    fn test_update_line_is_tagged() {
        let lobby =
            ChannelId::new("demo", "lobby", "voice.example.com", ChannelType::NonPositional)
                .unwrap();
        let p = Participant::new("p-9".into(), "sip:.demo.carol.@voice.example.com", false);
        let out = JsonFormatter.update(&lobby, &ChannelUpdate::ParticipantRemoved(p));
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["event"], "participant_removed");
        assert_eq!(value["data"]["handle"], "p-9");
        assert!(!out.contains('\n'));
    }
}
