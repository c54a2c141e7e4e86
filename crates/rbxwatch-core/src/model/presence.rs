use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Roblox presence type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize,
)]
pub enum PresenceType {
    #[strum(serialize = "Offline")]
    Offline,
    #[strum(serialize = "Online")]
    Online,
    #[strum(serialize = "In game")]
    InGame,
    #[strum(serialize = "In Studio")]
    InStudio,
    #[strum(serialize = "Unknown")]
    Unknown,
}

impl PresenceType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Offline,
            1 => Self::Online,
            2 => Self::InGame,
            3 => Self::InStudio,
            _ => Self::Unknown,
        }
    }

    /// Embed colour used when announcing this presence.
    pub fn colour(self) -> u32 {
        match self {
            Self::Online => 0x00_FF_00,
            Self::InGame => 0x00_99_FF,
            Self::InStudio => 0xFF_99_00,
            Self::Offline | Self::Unknown => 0x99_99_99,
        }
    }
}

/// Clamp an upstream presence value into the stored code range.
pub(crate) fn code_from_upstream(raw: i64) -> u8 {
    u8::try_from(raw.max(0)).unwrap_or(u8::MAX)
}
