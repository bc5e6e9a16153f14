//! Provider registry.
//!
//! [`ProviderKind`] is the fixed set of providers this crate knows how to
//! build. [`PluginManager`] holds the enabled ones in registration order,
//! which is also the order ties are broken in when results are ranked.
//! Provider names are strings only at this boundary.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::domain::{PluginInfo, ProviderError};
use super::itunes::ItunesClient;
use super::lrclib::LrclibClient;
use super::musicbrainz::MusicBrainzClient;
use super::traits::MetadataProvider;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};

/// Every provider the registry can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Lrclib,
    MusicBrainz,
    Itunes,
}

impl ProviderKind {
    /// Registration order.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Lrclib,
        ProviderKind::MusicBrainz,
        ProviderKind::Itunes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Lrclib => "lrclib",
            ProviderKind::MusicBrainz => "musicbrainz",
            ProviderKind::Itunes => "itunes",
        }
    }

    pub fn info(self) -> PluginInfo {
        let description = match self {
            ProviderKind::Lrclib => "Lyrics and track metadata from LRCLIB",
            ProviderKind::MusicBrainz => "Recording search with Cover Art Archive images",
            ProviderKind::Itunes => "iTunes Search catalogue with album artwork",
        };
        PluginInfo {
            name: self.as_str().to_string(),
            description: description.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Build the network client for this provider.
    pub fn build(self, config: &ProviderConfig) -> std::result::Result<Arc<dyn MetadataProvider>, ProviderError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        Ok(match self {
            ProviderKind::Lrclib => Arc::new(LrclibClient::new(timeout)?),
            ProviderKind::MusicBrainz => Arc::new(MusicBrainzClient::new(
                config.credential(self.as_str()),
                timeout,
            )?),
            ProviderKind::Itunes => Arc::new(ItunesClient::new(timeout)?),
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownPlugin(s.to_string()))
    }
}

/// The registered providers, in registration order.
#[derive(Clone, Default)]
pub struct PluginManager {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl PluginManager {
    /// Build every enabled provider. A provider whose client cannot be
    /// built is logged and left out.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut providers = Vec::new();
        for kind in ProviderKind::ALL {
            if !config.is_enabled(kind.as_str()) {
                tracing::debug!(target: "enrichment", provider = %kind, "Provider disabled");
                continue;
            }
            match kind.build(config) {
                Ok(provider) => providers.push(provider),
                Err(e) => {
                    tracing::warn!(target: "enrichment", provider = %kind, error = %e, "Failed to build provider")
                }
            }
        }
        tracing::info!(target: "enrichment", count = providers.len(), "Registered providers");
        Self { providers }
    }

    /// Register providers directly.
    pub fn with_providers(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        Self { providers }
    }

    pub fn all(&self) -> &[Arc<dyn MetadataProvider>] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.providers.iter().map(|p| p.info()).collect()
    }

    /// Look up a registered provider by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
            .cloned()
            .ok_or_else(|| Error::UnknownPlugin(name.to_string()))
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("PluginManager").field("providers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::traits::mocks::MockProvider;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("lrclib".parse::<ProviderKind>().unwrap(), ProviderKind::Lrclib);
        assert_eq!("MusicBrainz".parse::<ProviderKind>().unwrap(), ProviderKind::MusicBrainz);
        assert!(matches!("spotify".parse::<ProviderKind>(), Err(Error::UnknownPlugin(_))));
    }

    #[test]
    fn test_from_config_respects_enabled() {
        let mut config = ProviderConfig::default();
        config.enabled.insert("itunes".to_string(), false);

        let manager = PluginManager::from_config(&config);
        let names: Vec<String> = manager.list_plugins().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["lrclib", "musicbrainz"]);
    }

    #[test]
    fn test_get_unknown_plugin() {
        let manager = PluginManager::with_providers(vec![Arc::new(MockProvider::no_matches("a"))]);
        assert!(manager.get("a").is_ok());
        assert!(matches!(manager.get("b"), Err(Error::UnknownPlugin(name)) if name == "b"));
    }
}
