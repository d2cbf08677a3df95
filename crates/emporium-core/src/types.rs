//! Shared extension type definitions
//!
//! These types are used by the installer (on-disk state) and the plugin
//! loader (runtime state), and by the HTTP/CLI surfaces to parse user input.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Slugs name on-disk directories, so the pattern also rules out path separators
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("slug regex is valid"));

/// Check whether a string is a valid extension slug (`^[a-z0-9-]+$`)
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Which storefront surface a theme applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeTarget {
    Shop,
    Admin,
}

impl ThemeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeTarget::Shop => "shop",
            ThemeTarget::Admin => "admin",
        }
    }
}

impl std::fmt::Display for ThemeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of installable extension kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionKind {
    ThemeShop,
    ThemeAdmin,
    Plugin,
}

impl ExtensionKind {
    /// All kinds, in display order
    pub const ALL: [ExtensionKind; 3] = [
        ExtensionKind::ThemeShop,
        ExtensionKind::ThemeAdmin,
        ExtensionKind::Plugin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionKind::ThemeShop => "theme-shop",
            ExtensionKind::ThemeAdmin => "theme-admin",
            ExtensionKind::Plugin => "plugin",
        }
    }

    /// Name of the manifest file expected at the archive root
    pub fn manifest_file(&self) -> &'static str {
        match self {
            ExtensionKind::ThemeShop | ExtensionKind::ThemeAdmin => "theme.json",
            ExtensionKind::Plugin => "manifest.json",
        }
    }

    /// Theme target for theme kinds, `None` for plugins
    pub fn theme_target(&self) -> Option<ThemeTarget> {
        match self {
            ExtensionKind::ThemeShop => Some(ThemeTarget::Shop),
            ExtensionKind::ThemeAdmin => Some(ThemeTarget::Admin),
            ExtensionKind::Plugin => None,
        }
    }

    pub fn is_theme(&self) -> bool {
        self.theme_target().is_some()
    }
}

impl std::fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtensionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "theme-shop" => Ok(ExtensionKind::ThemeShop),
            "theme-admin" => Ok(ExtensionKind::ThemeAdmin),
            "plugin" => Ok(ExtensionKind::Plugin),
            other => Err(Error::invalid_kind(other)),
        }
    }
}

/// Where an installed archive came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionSource {
    #[default]
    LocalZip,
    OfficialMarket,
}

impl ExtensionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionSource::LocalZip => "local-zip",
            ExtensionSource::OfficialMarket => "official-market",
        }
    }
}

impl std::fmt::Display for ExtensionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtensionSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local-zip" => Ok(ExtensionSource::LocalZip),
            "official-market" => Ok(ExtensionSource::OfficialMarket),
            other => Err(Error::invalid_source(other)),
        }
    }
}

/// Plugin execution model
///
/// The wire names are kept from the manifest format shipped in archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeType {
    /// Code compiled into the host and attached in-process
    #[serde(rename = "internal-fastify")]
    Internal,
    /// Separate service reached through the reverse proxy
    #[serde(rename = "external-http")]
    External,
}

impl RuntimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeType::Internal => "internal-fastify",
            RuntimeType::External => "external-http",
        }
    }

    /// Parse a manifest value; `None` for anything outside the two allowed names
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "internal-fastify" => Some(RuntimeType::Internal),
            "external-http" => Some(RuntimeType::External),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("demo-pay", true ; "lowercase with hyphen")]
    #[test_case("theme2", true ; "digits")]
    #[test_case("---", true ; "hyphens only")]
    #[test_case("", false ; "empty")]
    #[test_case("Demo", false ; "uppercase")]
    #[test_case("demo_pay", false ; "underscore")]
    #[test_case("demo/pay", false ; "slash")]
    #[test_case("..", false ; "parent dir")]
    #[test_case("demo pay", false ; "whitespace")]
    #[test_case("demo\n", false ; "trailing newline")]
    fn test_slug_validation(slug: &str, expected: bool) {
        assert_eq!(is_valid_slug(slug), expected);
    }

    proptest! {
        #[test]
        fn prop_slug_accepts_only_allowed_alphabet(s in "\\PC{0,24}") {
            let expected = !s.is_empty()
                && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
            prop_assert_eq!(is_valid_slug(&s), expected);
        }

        #[test]
        fn prop_generated_slugs_are_accepted(s in "[a-z0-9-]{1,32}") {
            prop_assert!(is_valid_slug(&s));
        }
    }

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in ExtensionKind::ALL {
            let parsed: ExtensionKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("themes".parse::<ExtensionKind>().is_err());
    }

    #[test]
    fn test_kind_manifest_file() {
        assert_eq!(ExtensionKind::ThemeShop.manifest_file(), "theme.json");
        assert_eq!(ExtensionKind::ThemeAdmin.manifest_file(), "theme.json");
        assert_eq!(ExtensionKind::Plugin.manifest_file(), "manifest.json");
    }

    #[test]
    fn test_kind_theme_target() {
        assert_eq!(ExtensionKind::ThemeShop.theme_target(), Some(ThemeTarget::Shop));
        assert_eq!(ExtensionKind::ThemeAdmin.theme_target(), Some(ThemeTarget::Admin));
        assert_eq!(ExtensionKind::Plugin.theme_target(), None);
    }

    #[test]
    fn test_runtime_type_serde_names() {
        let json = serde_json::to_string(&RuntimeType::Internal).unwrap();
        assert_eq!(json, "\"internal-fastify\"");
        let parsed: RuntimeType = serde_json::from_str("\"external-http\"").unwrap();
        assert_eq!(parsed, RuntimeType::External);
        assert_eq!(RuntimeType::parse("wasm"), None);
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            "official-market".parse::<ExtensionSource>().unwrap(),
            ExtensionSource::OfficialMarket
        );
        assert!("github".parse::<ExtensionSource>().is_err());
    }
}
