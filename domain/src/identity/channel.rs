//! Channel identity value object.

use crate::core::error::DomainError;
use crate::core::name::{validate_domain, validate_segment};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const CHANNEL_PREFIX: &str = "sip:confctl-";
const PROPERTIES_MARKER: &str = "!p-";
const LARGE_TEXT_MARKER: &str = "!t";

/// Kind of conference channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Everyone hears everyone at full volume.
    NonPositional,
    /// Volume depends on 3D distance between participants.
    Positional,
    /// Loopback channel: the backend echoes the caller's own audio.
    Echo,
}

impl ChannelType {
    fn tag(self) -> char {
        match self {
            ChannelType::NonPositional => 'g',
            ChannelType::Positional => 'd',
            ChannelType::Echo => 'e',
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "g" => Some(ChannelType::NonPositional),
            "d" => Some(ChannelType::Positional),
            "e" => Some(ChannelType::Echo),
            _ => None,
        }
    }
}

/// How audio fades between the conversational and audible distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFadeModel {
    None,
    #[default]
    InverseByDistance,
    LinearByDistance,
    ExponentialByDistance,
}

impl AudioFadeModel {
    fn code(self) -> u8 {
        match self {
            AudioFadeModel::None => 0,
            AudioFadeModel::InverseByDistance => 1,
            AudioFadeModel::LinearByDistance => 2,
            AudioFadeModel::ExponentialByDistance => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AudioFadeModel::None),
            1 => Some(AudioFadeModel::InverseByDistance),
            2 => Some(AudioFadeModel::LinearByDistance),
            3 => Some(AudioFadeModel::ExponentialByDistance),
            _ => None,
        }
    }
}

/// 3D audio falloff properties of a positional channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionalProperties {
    /// Beyond this distance a speaker is inaudible.
    pub audible_distance: u32,
    /// Within this distance a speaker is heard at full volume.
    pub conversational_distance: u32,
    pub audio_fade_intensity: f32,
    pub fade_model: AudioFadeModel,
}

impl Default for PositionalProperties {
    fn default() -> Self {
        Self {
            audible_distance: 32,
            conversational_distance: 1,
            audio_fade_intensity: 1.0,
            fade_model: AudioFadeModel::InverseByDistance,
        }
    }
}

impl PositionalProperties {
    pub fn new(
        audible_distance: u32,
        conversational_distance: u32,
        audio_fade_intensity: f32,
        fade_model: AudioFadeModel,
    ) -> Result<Self, DomainError> {
        let props = Self {
            audible_distance,
            conversational_distance,
            audio_fade_intensity,
            fade_model,
        };
        props.validate()?;
        Ok(props)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.audible_distance == 0 {
            return Err(DomainError::InvalidPositionalProperties(
                "audible distance must be positive".into(),
            ));
        }
        if self.conversational_distance == 0 || self.conversational_distance > self.audible_distance
        {
            return Err(DomainError::InvalidPositionalProperties(format!(
                "conversational distance {} must be within 1..={}",
                self.conversational_distance, self.audible_distance
            )));
        }
        if !self.audio_fade_intensity.is_finite() || self.audio_fade_intensity < 0.0 {
            return Err(DomainError::InvalidPositionalProperties(format!(
                "fade intensity {} must be a non-negative number",
                self.audio_fade_intensity
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PositionalProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}-{}-{:.3}-{}",
            PROPERTIES_MARKER,
            self.audible_distance,
            self.conversational_distance,
            self.audio_fade_intensity,
            self.fade_model.code()
        )
    }
}

impl FromStr for PositionalProperties {
    type Err = DomainError;

    /// Parses the part after `!p-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &str| DomainError::InvalidPositionalProperties(format!("{s}: {reason}"));
        let fields: Vec<&str> = s.split('-').collect();
        let [audible, conversational, intensity, model] = fields.as_slice() else {
            return Err(bad("expected four '-' separated fields"));
        };
        let audible = audible.parse().map_err(|_| bad("audible distance"))?;
        let conversational = conversational
            .parse()
            .map_err(|_| bad("conversational distance"))?;
        let intensity = intensity.parse().map_err(|_| bad("fade intensity"))?;
        let model = model
            .parse::<u8>()
            .ok()
            .and_then(AudioFadeModel::from_code)
            .ok_or_else(|| bad("fade model"))?;
        Self::new(audible, conversational, intensity, model)
    }
}

/// Identity of a conference channel (Value Object).
///
/// Equality and hashing consider `(domain, name, issuer, kind)`. Positional
/// properties, environment id and the large-text marker only shape the URI.
#[derive(Debug, Clone)]
pub struct ChannelId {
    issuer: String,
    name: String,
    domain: String,
    kind: ChannelType,
    properties: Option<PositionalProperties>,
    environment_id: Option<String>,
    large_text: bool,
}

impl ChannelId {
    /// Build a channel identity. Positional channels get default properties.
    pub fn new(
        issuer: impl Into<String>,
        name: impl Into<String>,
        domain: impl Into<String>,
        kind: ChannelType,
    ) -> Result<Self, DomainError> {
        let issuer = issuer.into();
        let name = name.into();
        let domain = domain.into();
        validate_segment("issuer", &issuer)?;
        validate_segment("channel name", &name)?;
        validate_domain(&domain)?;
        Ok(Self {
            issuer,
            name,
            domain,
            kind,
            properties: (kind == ChannelType::Positional).then(PositionalProperties::default),
            environment_id: None,
            large_text: false,
        })
    }

    pub fn with_properties(mut self, properties: PositionalProperties) -> Result<Self, DomainError> {
        if self.kind != ChannelType::Positional {
            return Err(DomainError::PropertiesOnNonPositionalChannel);
        }
        properties.validate()?;
        self.properties = Some(properties);
        Ok(self)
    }

    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Result<Self, DomainError> {
        let env = environment_id.into();
        validate_segment("environment id", &env)?;
        self.environment_id = Some(env);
        Ok(self)
    }

    pub fn with_large_text(mut self, large_text: bool) -> Self {
        self.large_text = large_text;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn kind(&self) -> ChannelType {
        self.kind
    }

    pub fn properties(&self) -> Option<&PositionalProperties> {
        self.properties.as_ref()
    }

    pub fn environment_id(&self) -> Option<&str> {
        self.environment_id.as_deref()
    }

    pub fn is_large_text(&self) -> bool {
        self.large_text
    }

    pub fn is_positional(&self) -> bool {
        self.kind == ChannelType::Positional
    }

    /// The URI string used on the wire.
    pub fn to_uri(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for ChannelId {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.name == other.name
            && self.issuer == other.issuer
            && self.kind == other.kind
    }
}

impl Eq for ChannelId {}

impl Hash for ChannelId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domain.hash(state);
        self.name.hash(state);
        self.issuer.hash(state);
        self.kind.hash(state);
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}-{}.{}",
            CHANNEL_PREFIX,
            self.kind.tag(),
            self.issuer,
            self.name
        )?;
        if let Some(env) = &self.environment_id {
            write!(f, ".{}", env)?;
        }
        if let Some(props) = &self.properties {
            write!(f, "{}", props)?;
        }
        if self.large_text {
            f.write_str(LARGE_TEXT_MARKER)?;
        }
        write!(f, "@{}", self.domain)
    }
}

impl FromStr for ChannelId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(CHANNEL_PREFIX)
            .ok_or_else(|| DomainError::invalid_uri(s, "missing 'sip:confctl-' prefix"))?;
        let (tag, rest) = rest
            .split_once('-')
            .ok_or_else(|| DomainError::invalid_uri(s, "missing channel type tag"))?;
        let kind = ChannelType::from_tag(tag)
            .ok_or_else(|| DomainError::invalid_uri(s, format!("unknown channel type '{tag}'")))?;
        let (local, domain) = rest
            .rsplit_once('@')
            .ok_or_else(|| DomainError::invalid_uri(s, "missing '@domain'"))?;

        let (local, large_text) = match local.strip_suffix(LARGE_TEXT_MARKER) {
            Some(stripped) => (stripped, true),
            None => (local, false),
        };
        let (local, properties) = match local.split_once(PROPERTIES_MARKER) {
            Some((head, props)) => (head, Some(props.parse::<PositionalProperties>()?)),
            None => (local, None),
        };

        let parts: Vec<&str> = local.split('.').collect();
        let (issuer, name, env) = match parts.as_slice() {
            [issuer, name] => (*issuer, *name, None),
            [issuer, name, env] => (*issuer, *name, Some(*env)),
            _ => {
                return Err(DomainError::invalid_uri(
                    s,
                    "expected issuer.name[.environment]",
                ));
            }
        };

        let mut id = Self::new(issuer, name, domain, kind)?.with_large_text(large_text);
        if let Some(env) = env {
            id = id.with_environment(env)?;
        }
        if let Some(props) = properties {
            id = id.with_properties(props)?;
        }
        Ok(id)
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "mt1.voice.example.com";

    #[test]
    fn test_non_positional_uri() {
        let id = ChannelId::new("acme", "lobby", DOMAIN, ChannelType::NonPositional).unwrap();
        assert_eq!(id.to_string(), "sip:confctl-g-acme.lobby@mt1.voice.example.com");
        assert!(id.properties().is_none());
    }

    #[test]
    fn test_positional_uri_carries_default_properties() {
        let id = ChannelId::new("acme", "arena", DOMAIN, ChannelType::Positional).unwrap();
        assert_eq!(
            id.to_string(),
            "sip:confctl-d-acme.arena!p-32-1-1.000-1@mt1.voice.example.com"
        );
    }

    #[test]
    fn test_full_uri_parses_back() {
        let props = PositionalProperties::new(50, 5, 0.5, AudioFadeModel::LinearByDistance).unwrap();
        let id = ChannelId::new("acme", "arena", DOMAIN, ChannelType::Positional)
            .unwrap()
            .with_environment("prod")
            .unwrap()
            .with_properties(props)
            .unwrap()
            .with_large_text(true);
        let uri = id.to_string();
        assert_eq!(
            uri,
            "sip:confctl-d-acme.arena.prod!p-50-5-0.500-2!t@mt1.voice.example.com"
        );

        let parsed: ChannelId = uri.parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.properties(), Some(&props));
        assert_eq!(parsed.environment_id(), Some("prod"));
        assert!(parsed.is_large_text());
    }

    #[test]
    fn test_equality_includes_kind() {
        let a = ChannelId::new("acme", "room", DOMAIN, ChannelType::NonPositional).unwrap();
        let b = ChannelId::new("acme", "room", DOMAIN, ChannelType::Echo).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_ignores_properties_and_environment() {
        let a = ChannelId::new("acme", "arena", DOMAIN, ChannelType::Positional).unwrap();
        let b = a
            .clone()
            .with_properties(PositionalProperties::new(10, 2, 2.0, AudioFadeModel::None).unwrap())
            .unwrap()
            .with_environment("dev")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_properties_rejected_on_non_positional() {
        let id = ChannelId::new("acme", "lobby", DOMAIN, ChannelType::NonPositional).unwrap();
        assert_eq!(
            id.with_properties(PositionalProperties::default()).unwrap_err(),
            DomainError::PropertiesOnNonPositionalChannel
        );
    }

    #[test]
    fn test_invalid_properties() {
        assert!(PositionalProperties::new(0, 0, 1.0, AudioFadeModel::None).is_err());
        assert!(PositionalProperties::new(10, 11, 1.0, AudioFadeModel::None).is_err());
        assert!(PositionalProperties::new(10, 1, f32::NAN, AudioFadeModel::None).is_err());
        assert!("10-1-1.0-9".parse::<PositionalProperties>().is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!("sip:confctl-x-acme.room@d.example".parse::<ChannelId>().is_err());
        assert!("sip:.acme.alice.@d.example".parse::<ChannelId>().is_err());
    }
}
