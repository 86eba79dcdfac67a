use serde::{Deserialize, Serialize};

/// Theme the user selected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the operating system preference.
    #[default]
    System,
}

/// Operating system color preference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

/// Identifier of a base-map style as the rendering surface knows it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleId(String);

impl StyleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StyleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleCatalog {
    pub light: StyleId,
    pub dark: StyleId,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self {
            light: StyleId::new("mapbox://styles/mapbox/light-v11"),
            dark: StyleId::new("mapbox://styles/mapbox/dark-v11"),
        }
    }
}

impl StyleCatalog {
    /// The style to show for `theme` given the current OS preference.
    pub fn resolve(&self, theme: Theme, scheme: ColorScheme) -> &StyleId {
        match (theme, scheme) {
            (Theme::Light, _) | (Theme::System, ColorScheme::Light) => &self.light,
            (Theme::Dark, _) | (Theme::System, ColorScheme::Dark) => &self.dark,
        }
    }
}
