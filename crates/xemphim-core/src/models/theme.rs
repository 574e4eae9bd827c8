use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The user's stored theme choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    pub const ALL: &[ThemePreference] = &[Self::Light, Self::Dark, Self::System];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    /// Next value in the toggle cycle: system → light → dark → system.
    pub fn next(self) -> Self {
        match self {
            Self::System => Self::Light,
            Self::Light => Self::Dark,
            Self::Dark => Self::System,
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of `light`, `dark`, `system`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPreference(pub String);

impl fmt::Display for UnknownPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown theme preference: {:?}", self.0)
    }
}

impl std::error::Error for UnknownPreference {}

impl FromStr for ThemePreference {
    type Err = UnknownPreference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(UnknownPreference(other.to_string())),
        }
    }
}

/// The rendered appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    Dark,
}

impl ColorScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine a preference with the OS-reported scheme.
///
/// `System` follows the OS and falls back to light when the OS reports nothing.
pub fn resolve_color_scheme(pref: ThemePreference, os: Option<ColorScheme>) -> ColorScheme {
    match pref {
        ThemePreference::Light => ColorScheme::Light,
        ThemePreference::Dark => ColorScheme::Dark,
        ThemePreference::System => os.unwrap_or(ColorScheme::Light),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_values() {
        for pref in ThemePreference::ALL {
            assert_eq!(pref.as_str().parse::<ThemePreference>(), Ok(*pref));
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("Dark".parse::<ThemePreference>().is_err());
        assert!("".parse::<ThemePreference>().is_err());
        assert!("auto".parse::<ThemePreference>().is_err());
    }

    #[test]
    fn test_cycle() {
        let mut pref = ThemePreference::System;
        let mut seen = vec![pref];
        for _ in 0..3 {
            pref = pref.next();
            seen.push(pref);
        }
        assert_eq!(
            seen,
            vec![
                ThemePreference::System,
                ThemePreference::Light,
                ThemePreference::Dark,
                ThemePreference::System,
            ]
        );
    }

    #[test]
    fn test_resolve_all_combinations() {
        use ColorScheme::{Dark, Light};
        let cases = [
            (ThemePreference::Light, Some(Light), Light),
            (ThemePreference::Light, Some(Dark), Light),
            (ThemePreference::Light, None, Light),
            (ThemePreference::Dark, Some(Light), Dark),
            (ThemePreference::Dark, Some(Dark), Dark),
            (ThemePreference::Dark, None, Dark),
            (ThemePreference::System, Some(Light), Light),
            (ThemePreference::System, Some(Dark), Dark),
            (ThemePreference::System, None, Light),
        ];
        for (pref, os, expected) in cases {
            assert_eq!(resolve_color_scheme(pref, os), expected, "{pref} / {os:?}");
        }
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ThemePreference::System).unwrap();
        assert_eq!(json, "\"system\"");
        let scheme: ColorScheme = serde_json::from_str("\"dark\"").unwrap();
        assert_eq!(scheme, ColorScheme::Dark);
    }
}
