//! Variant catalog and model source candidates

use serde::Serialize;

use crate::config::{CatalogConfig, LoaderConfig, VariantConfig};

/// A selectable glasses variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variant {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub url: String,
    pub mirrors: Vec<String>,
    pub scale: f32,
    pub color: String,
}

impl From<&VariantConfig> for Variant {
    fn from(c: &VariantConfig) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            icon: c.icon.clone(),
            url: c.url.clone(),
            mirrors: c.mirrors.clone(),
            scale: c.scale,
            color: c.color.clone(),
        }
    }
}

/// One place a model may be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceCandidate {
    Direct { url: String },
    Proxy { proxy: String, url: String },
}

impl SourceCandidate {
    /// The URL actually requested
    pub fn request_url(&self) -> String {
        match self {
            Self::Direct { url } => url.clone(),
            Self::Proxy { proxy, url } => format!("{}{}", proxy, url),
        }
    }
}

pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Variant {
    /// Ordered candidate list: the URL and its mirrors directly, then each remote URL through each proxy.
    ///
    /// Local paths are never proxied.
    pub fn sources(&self, loader: &LoaderConfig) -> Vec<SourceCandidate> {
        let urls: Vec<&String> = std::iter::once(&self.url).chain(self.mirrors.iter()).collect();

        let direct = urls.iter().map(|url| SourceCandidate::Direct {
            url: (*url).clone(),
        });

        let proxied = urls.iter().filter(|url| is_remote(url)).flat_map(|url| {
            loader.cors_proxies.iter().map(move |proxy| SourceCandidate::Proxy {
                proxy: proxy.clone(),
                url: (*url).clone(),
            })
        });

        direct.chain(proxied).take(loader.max_attempts).collect()
    }
}

/// The list of variants the user can pick from
#[derive(Debug, Clone, Serialize)]
pub struct VariantCatalog {
    variants: Vec<Variant>,
    default_id: String,
}

impl VariantCatalog {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            variants: config.variants.iter().map(Variant::from).collect(),
            default_id: config.default_variant.clone(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn default_variant(&self) -> Option<&Variant> {
        self.get(&self.default_id).or_else(|| self.variants.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_variant() -> Variant {
        Variant {
            id: "aviator".into(),
            name: "Aviator".into(),
            icon: String::new(),
            url: "https://cdn.example.com/aviator.glb".into(),
            mirrors: vec!["https://mirror.example.com/aviator.glb".into()],
            scale: 0.8,
            color: "#FFD700".into(),
        }
    }

    #[test]
    fn test_sources_direct_first() {
        let loader = LoaderConfig {
            cors_proxies: vec!["https://proxy.one/?".into()],
            max_attempts: 10,
            ..Default::default()
        };
        let sources = remote_variant().sources(&loader);

        assert_eq!(sources.len(), 4);
        assert!(matches!(sources[0], SourceCandidate::Direct { .. }));
        assert!(matches!(sources[1], SourceCandidate::Direct { .. }));
        assert_eq!(
            sources[2].request_url(),
            "https://proxy.one/?https://cdn.example.com/aviator.glb"
        );
    }

    #[test]
    fn test_sources_bounded_by_max_attempts() {
        let loader = LoaderConfig {
            max_attempts: 2,
            ..Default::default()
        };
        assert_eq!(remote_variant().sources(&loader).len(), 2);
    }

    #[test]
    fn test_local_url_not_proxied() {
        let catalog = VariantCatalog::new(&CatalogConfig::default());
        let sources = catalog.get("sport").unwrap().sources(&LoaderConfig::default());
        assert_eq!(
            sources,
            vec![SourceCandidate::Direct {
                url: "models/sunglasses-sport.glb".into()
            }]
        );
    }

    #[test]
    fn test_default_catalog() {
        let catalog = VariantCatalog::new(&CatalogConfig::default());
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.default_variant().unwrap().id, "aviator");
        assert_eq!(catalog.get("retro").unwrap().scale, 0.85);
        assert!(catalog.get("monocle").is_none());
    }

    #[test]
    fn test_unknown_default_falls_back_to_first() {
        let config = CatalogConfig {
            default_variant: "monocle".into(),
            ..Default::default()
        };
        let catalog = VariantCatalog::new(&config);
        assert_eq!(catalog.default_variant().unwrap().id, "aviator");

        let empty = VariantCatalog::new(&CatalogConfig {
            default_variant: "aviator".into(),
            variants: Vec::new(),
        });
        assert!(empty.default_variant().is_none());
    }
}
