use std::fmt;
use std::str::FromStr;

use crate::error::AutosubError;

/// Languages the pipeline knows how to transcribe and translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    ZhTw,
    En,
    Ja,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::ZhTw, Language::En, Language::Ja];

    /// BCP-47 code used by translation APIs
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZhTw => "zh-TW",
            Self::En => "en",
            Self::Ja => "ja",
        }
    }

    /// Code variant expected by the cloud speech API
    pub fn gcloud_code(&self) -> &'static str {
        match self {
            Self::ZhTw => "zh-TW",
            Self::En => "en",
            Self::Ja => "ja-JP",
        }
    }

    /// English display name, used in prompts
    pub fn name(&self) -> &'static str {
        match self {
            Self::ZhTw => "Traditional Chinese",
            Self::En => "English",
            Self::Ja => "Japanese",
        }
    }

    /// Enumeration name accepted on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Self::ZhTw => "ZH_TW",
            Self::En => "EN",
            Self::Ja => "JA",
        }
    }

    /// Primary subtag of the code, e.g. `zh` for `zh-TW`
    pub fn primary_subtag(&self) -> &'static str {
        let code = self.code();
        code.split('-').next().unwrap_or(code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = AutosubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|language| {
                language.key().eq_ignore_ascii_case(wanted)
                    || language.code().eq_ignore_ascii_case(wanted)
                    || language.name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| {
                let choices: Vec<&str> = Self::ALL.iter().map(|l| l.key()).collect();
                AutosubError::Configuration(format!(
                    "Unknown language '{}'. Valid languages: {}",
                    s,
                    choices.join(", ")
                ))
            })
    }
}
