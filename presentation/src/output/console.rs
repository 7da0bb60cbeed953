//! Console output formatter for session activity

use crate::output::formatter::EventFormatter;
use colored::Colorize;
use voxlink_application::ChannelUpdate;
use voxlink_domain::{
    AccountId, ChannelId, ChannelTextMessage, ConnectionState, LoginState, Participant,
};

/// Formats session activity for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Force colors on or off for the whole process
    pub fn set_color(enabled: bool) {
        colored::control::set_override(enabled);
    }

    fn prefix(channel: &ChannelId) -> String {
        format!("[{}]", channel.name()).cyan().bold().to_string()
    }

    fn participant_line(participant: &Participant) -> String {
        let name = participant
            .display_name
            .as_deref()
            .unwrap_or(&participant.account_uri);
        let mut flags = Vec::new();
        if participant.is_self {
            flags.push("you".green().to_string());
        }
        if participant.speaking {
            flags.push("speaking".yellow().to_string());
        }
        if participant.muted {
            flags.push("muted".red().to_string());
        }
        if participant.local_mute {
            flags.push("muted locally".dimmed().to_string());
        }
        if flags.is_empty() {
            name.to_string()
        } else {
            format!("{} ({})", name, flags.join(", "))
        }
    }

    fn color_state(label: &str, state: ConnectionState) -> String {
        match state {
            ConnectionState::Connected => label.green().to_string(),
            ConnectionState::Connecting => label.yellow().to_string(),
            ConnectionState::Disconnecting => label.yellow().dimmed().to_string(),
            ConnectionState::Disconnected => label.red().to_string(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl EventFormatter for ConsoleFormatter {
    fn login_state(&self, account: &AccountId, state: LoginState) -> String {
        let label = match state {
            LoginState::LoggedIn => state.as_str().green().bold(),
            LoginState::LoggedOut => state.as_str().red(),
            _ => state.as_str().yellow(),
        };
        format!("{} {} {}", "login".magenta().bold(), account.name().bold(), label)
    }

    fn channel_state(&self, channel: &ChannelId, stream: &str, state: ConnectionState) -> String {
        format!(
            "{} {} {}",
            Self::prefix(channel),
            stream.dimmed(),
            Self::color_state(state.as_str(), state)
        )
    }

    fn update(&self, channel: &ChannelId, update: &ChannelUpdate) -> String {
        let prefix = Self::prefix(channel);
        match update {
            ChannelUpdate::ParticipantAdded(p) => {
                format!("{} {} {}", prefix, "+".green().bold(), Self::participant_line(p))
            }
            ChannelUpdate::ParticipantUpdated(p) => {
                format!("{} {} {}", prefix, "~".yellow(), Self::participant_line(p))
            }
            ChannelUpdate::ParticipantRemoved(p) => {
                format!("{} {} {}", prefix, "-".red().bold(), Self::participant_line(p))
            }
            ChannelUpdate::MessageReceived(m) => format!(
                "{} {} {}",
                prefix,
                format!("<{}>", sender_label(m)).blue().bold(),
                m.text
            ),
            ChannelUpdate::TranscriptionReceived(t) => format!(
                "{} {} {}",
                prefix,
                format!("({} said)", t.speaker_uri).dimmed(),
                t.text.italic()
            ),
        }
    }

    fn roster(&self, channel: &ChannelId, participants: &[Participant]) -> String {
        let mut output = Self::header(&format!("{} participants", channel.name()));
        output.push('\n');
        for participant in participants {
            output.push_str(&format!("  * {}\n", Self::participant_line(participant)));
        }
        output
    }

    fn history(&self, channel: &ChannelId, messages: &[ChannelTextMessage]) -> String {
        let mut output = Self::header(&format!("{} history ({})", channel.name(), messages.len()));
        output.push('\n');
        for message in messages {
            output.push_str(&format!(
                "{} {} {}\n",
                message.timestamp.format("%H:%M:%S").to_string().dimmed(),
                format!("<{}>", sender_label(message)).blue(),
                message.text
            ));
        }
        output
    }

    fn error(&self, context: &str, error: &dyn std::fmt::Display) -> String {
        format!("{} {}: {}", "error".red().bold(), context, error)
    }
}

fn sender_label(message: &ChannelTextMessage) -> &str {
    message
        .sender_display_name
        .as_deref()
        .unwrap_or(&message.sender_uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use voxlink_domain::ChannelType;

    fn lobby() -> ChannelId {
        ChannelId::new("demo", "lobby", "voice.example.com", ChannelType::NonPositional).unwrap()
    }

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_participant_flags() {
        plain();
        let mut p = Participant::new("p-1".into(), "sip:.demo.bob.@voice.example.com", false);
        p.display_name = Some("Bob".into());
        p.muted = true;
        let line = ConsoleFormatter.update(&lobby(), &ChannelUpdate::ParticipantAdded(p));
        assert_eq!(line, "[lobby] + Bob (muted)");
    }

    #[test]
    fn test_history_lists_every_message() {
        plain();
        let messages: Vec<_> = (0..3)
            .map(|n| ChannelTextMessage {
                id: format!("m{}", n),
                sender_uri: "sip:.demo.bob.@voice.example.com".into(),
                sender_display_name: Some("Bob".into()),
                text: format!("line {}", n),
                language: None,
                timestamp: Utc.timestamp_opt(3600 * 10 + n, 0).unwrap(),
                from_self: false,
            })
            .collect();
        let output = ConsoleFormatter.history(&lobby(), &messages);
        assert!(output.contains("lobby history (3)"));
        assert!(output.contains("10:00:02 <Bob> line 2"));
    }

    #[test]
    fn test_indent() {
        assert_eq!(ConsoleFormatter::indent("a\nb", "  "), "  a\n  b");
    }
}
