use crate::error::InvestigationError;

/// Discord embed descriptions cap at 4096; keep headroom for the footer line.
pub const DESCRIPTION_MAX_CHARS: usize = 3900;
pub const TRIGGER_MAX_CHARS: usize = 100;
pub const ALIAS_MAX_CHARS: usize = 40;
pub const MAX_ALIASES: usize = 5;

/// A discoverable clue registered in one channel of one guild.
#[derive(Debug, Clone, PartialEq)]
pub struct TruthBullet {
    pub id: i64,
    pub guild_id: String,
    pub channel_id: String,
    pub trigger: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub image: Option<String>,
    pub found: bool,
    pub finder: Option<String>,
    pub found_at: Option<String>,
    pub hidden: bool,
}

impl TruthBullet {
    /// The trigger plus every alias, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.trigger.as_str()).chain(self.aliases.iter().map(|a| a.as_str()))
    }

    /// Case-insensitive equality against the trigger or any alias.
    pub fn matches_name(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.names().any(|n| n.to_lowercase() == lowered)
    }
}

/// Fields required to register a new Truth Bullet. Aliases are attached
/// afterwards through the alias commands.
#[derive(Debug, Clone)]
pub struct NewBullet {
    pub guild_id: String,
    pub channel_id: String,
    pub trigger: String,
    pub description: String,
    pub image: Option<String>,
    pub hidden: bool,
}

/// How discoveries are triggered in a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum InvestigationType {
    /// Ordinary chat messages are scanned for triggers.
    #[name = "default"]
    Default,
    /// Bullets can only be found through the /find command.
    #[name = "command-only"]
    CommandOnly,
}

impl InvestigationType {
    pub fn from_db(value: i64) -> Self {
        match value {
            2 => Self::CommandOnly,
            _ => Self::Default,
        }
    }

    pub fn as_db(self) -> i64 {
        match self {
            Self::Default => 1,
            Self::CommandOnly => 2,
        }
    }
}

/// Whether a thread counts as its own clue scope or as its parent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ThreadBehavior {
    /// Threads hold their own set of Truth Bullets.
    #[name = "distinct"]
    Distinct,
    /// Messages in threads count against the parent channel's bullets.
    #[name = "parent"]
    Parent,
}

impl ThreadBehavior {
    pub fn from_db(value: i64) -> Self {
        match value {
            2 => Self::Parent,
            _ => Self::Distinct,
        }
    }

    pub fn as_db(self) -> i64 {
        match self {
            Self::Distinct => 1,
            Self::Parent => 2,
        }
    }
}

/// Per-guild investigation configuration. One row per guild, created by
/// `/investigation setup` and deleted when the bot leaves the guild.
#[derive(Debug, Clone, PartialEq)]
pub struct GuildConfig {
    pub guild_id: String,
    pub player_role: Option<String>,
    pub bullets_enabled: bool,
    pub bullet_channel_id: Option<String>,
    pub best_finder_role: Option<String>,
    pub investigation_type: InvestigationType,
    pub thread_behavior: ThreadBehavior,
    pub show_best_finders: bool,
}

impl GuildConfig {
    pub fn new(guild_id: String) -> Self {
        Self {
            guild_id,
            player_role: None,
            bullets_enabled: false,
            bullet_channel_id: None,
            best_finder_role: None,
            investigation_type: InvestigationType::Default,
            thread_behavior: ThreadBehavior::Distinct,
            show_best_finders: true,
        }
    }

    /// Whether the message-scan hot path should care about this guild.
    pub fn is_active(&self) -> bool {
        self.bullets_enabled && self.investigation_type != InvestigationType::CommandOnly
    }
}

pub fn validate_trigger(trigger: &str) -> Result<(), InvestigationError> {
    if trigger.chars().count() > TRIGGER_MAX_CHARS {
        return Err(InvestigationError::TriggerTooLong);
    }
    Ok(())
}

pub fn validate_alias(alias: &str) -> Result<(), InvestigationError> {
    if alias.chars().count() > ALIAS_MAX_CHARS {
        return Err(InvestigationError::AliasTooLong);
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), InvestigationError> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(InvestigationError::DescriptionTooLong);
    }
    Ok(())
}

pub fn validate_image_url(image: &str) -> Result<(), InvestigationError> {
    match url::Url::parse(image) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(InvestigationError::InvalidImageUrl(image.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_length_boundary() {
        let exact: String = "x".repeat(TRIGGER_MAX_CHARS);
        assert!(validate_trigger(&exact).is_ok());

        let over: String = "x".repeat(TRIGGER_MAX_CHARS + 1);
        assert!(matches!(
            validate_trigger(&over),
            Err(InvestigationError::TriggerTooLong)
        ));
    }

    #[test]
    fn test_alias_length_boundary() {
        assert!(validate_alias(&"a".repeat(ALIAS_MAX_CHARS)).is_ok());
        assert!(matches!(
            validate_alias(&"a".repeat(ALIAS_MAX_CHARS + 1)),
            Err(InvestigationError::AliasTooLong)
        ));
    }

    #[test]
    fn test_image_url_validation() {
        assert!(validate_image_url("https://example.com/knife.png").is_ok());
        assert!(validate_image_url("http://example.com/a.jpg").is_ok());
        assert!(validate_image_url("ftp://example.com/a.jpg").is_err());
        assert!(validate_image_url("not a url").is_err());
    }

    #[test]
    fn test_matches_name_is_case_insensitive() {
        let bullet = TruthBullet {
            id: 1,
            guild_id: "g".into(),
            channel_id: "c".into(),
            trigger: "Knife".into(),
            aliases: vec!["Bloody Knife".into()],
            description: "d".into(),
            image: None,
            found: false,
            finder: None,
            found_at: None,
            hidden: false,
        };
        assert!(bullet.matches_name("knife"));
        assert!(bullet.matches_name("BLOODY KNIFE"));
        assert!(!bullet.matches_name("knif"));
    }

    #[test]
    fn test_enum_db_round_trip() {
        for ty in [InvestigationType::Default, InvestigationType::CommandOnly] {
            assert_eq!(InvestigationType::from_db(ty.as_db()), ty);
        }
        for tb in [ThreadBehavior::Distinct, ThreadBehavior::Parent] {
            assert_eq!(ThreadBehavior::from_db(tb.as_db()), tb);
        }
    }
}
