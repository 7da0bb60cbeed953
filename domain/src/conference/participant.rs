//! Channel participants.

use crate::identity::ParticipantHandle;
use serde::{Deserialize, Serialize};

/// A participant in a channel session.
///
/// Created by a participant-added event and mutated only by later
/// participant-updated events (plus the purely local `local_mute`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub handle: ParticipantHandle,
    /// Account URI with any backend resource tag stripped.
    pub account_uri: String,
    pub display_name: Option<String>,
    /// Whether this participant is the local user.
    pub is_self: bool,
    pub speaking: bool,
    /// Muted by the participant or by a moderator.
    pub muted: bool,
    /// Muted only for the local listener.
    pub local_mute: bool,
    /// Audio energy in `0.0..=1.0`.
    pub energy: f64,
    pub in_audio: bool,
    pub in_text: bool,
}

impl Participant {
    pub fn new(handle: ParticipantHandle, account_uri: impl Into<String>, is_self: bool) -> Self {
        Self {
            handle,
            account_uri: account_uri.into(),
            display_name: None,
            is_self,
            speaking: false,
            muted: false,
            local_mute: false,
            energy: 0.0,
            in_audio: false,
            in_text: false,
        }
    }

    /// Apply a participant update and report whether anything changed.
    pub fn apply(&mut self, update: &ParticipantUpdate) -> bool {
        let energy = update.energy.clamp(0.0, 1.0);
        let changed = self.speaking != update.speaking
            || self.muted != update.muted
            || self.energy != energy
            || self.in_audio != update.in_audio
            || self.in_text != update.in_text;
        self.speaking = update.speaking;
        self.muted = update.muted;
        self.energy = energy;
        self.in_audio = update.in_audio;
        self.in_text = update.in_text;
        changed
    }
}

/// Mutable participant properties as pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    pub speaking: bool,
    pub muted: bool,
    pub energy: f64,
    pub in_audio: bool,
    pub in_text: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(speaking: bool, energy: f64) -> ParticipantUpdate {
        ParticipantUpdate {
            speaking,
            muted: false,
            energy,
            in_audio: true,
            in_text: false,
        }
    }

    #[test]
    fn apply_reports_change_only_once() {
        let mut p = Participant::new("p-1".into(), "sip:.acme.bob.@d.example", false);
        assert!(p.apply(&update(true, 0.4)));
        assert!(!p.apply(&update(true, 0.4)));
        assert!(p.apply(&update(false, 0.4)));
    }

    #[test]
    fn apply_clamps_energy() {
        let mut p = Participant::new("p-1".into(), "uri", false);
        p.apply(&update(true, 7.5));
        assert_eq!(p.energy, 1.0);
    }
}
