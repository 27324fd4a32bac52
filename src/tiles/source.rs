use crate::core::geo::TileKey;

/// Trait representing anything that can produce a resource key for a tile.
pub trait TileSource: Send + Sync {
    /// Build the resource key (URL or relative path) for `key`.
    fn url(&self, key: TileKey) -> String;
}

/// Expand `{level}`, `{col}`/`{x}` and `{row}`/`{y}` placeholders.
pub fn expand_pattern(pattern: &str, key: TileKey) -> String {
    pattern
        .replace("{level}", &key.level.to_string())
        .replace("{col}", &key.col.to_string())
        .replace("{x}", &key.col.to_string())
        .replace("{row}", &key.row.to_string())
        .replace("{y}", &key.row.to_string())
}

/// Source backed by a placeholder pattern, e.g. `"tiles/1_1/tile_{col}_{row}.png"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSource {
    pattern: String,
}

impl PatternSource {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl TileSource for PatternSource {
    fn url(&self, key: TileKey) -> String {
        expand_pattern(&self.pattern, key)
    }
}

/// Source that resolves keys through the tier registry, so one raster cache
/// serves every tier.
pub struct TierSource {
    registry: std::sync::Arc<crate::core::tier::TierRegistry>,
}

impl TierSource {
    pub fn new(registry: std::sync::Arc<crate::core::tier::TierRegistry>) -> Self {
        Self { registry }
    }
}

impl TileSource for TierSource {
    fn url(&self, key: TileKey) -> String {
        match self.registry.by_level(key.level) {
            Some(tier) => tier.source_for(key),
            None => {
                log::warn!("no tier registered for level {}", key.level);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_expansion() {
        let source = PatternSource::new("tiles/{level}/tile_{col}_{row}.png");
        assert_eq!(source.url(TileKey::new(2, 7, 11)), "tiles/2/tile_7_11.png");

        let source = PatternSource::new("rare_{x}_{y}.json");
        assert_eq!(source.url(TileKey::new(0, 3, 4)), "rare_3_4.json");
    }
}
