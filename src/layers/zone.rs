//! Labeled identifier ranges ("zones") and their projection onto tier pixels.

use super::countries::REGISTRATION_GROUPS;
use crate::core::address::{prefix_range, Identifier};
use crate::core::tier::TierScale;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// Half-open identifier range `[id_start, id_end)` with a display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id_start: Identifier,
    pub id_end: Identifier,
    pub label: String,
}

impl Zone {
    pub fn new(id_start: Identifier, id_end: Identifier, label: impl Into<String>) -> Self {
        Self {
            id_start,
            id_end,
            label: label.into(),
        }
    }

    /// Zone covering a registration-group prefix such as `"978-3"`.
    pub fn from_prefix(prefix: &str, label: impl Into<String>) -> Result<Self> {
        let (start, end) = prefix_range(prefix)?;
        Ok(Self::new(start, end, label))
    }

    pub fn contains(&self, id: Identifier) -> bool {
        self.id_start <= id && id < self.id_end
    }

    /// Last identifier inside the zone.
    fn last(&self) -> Identifier {
        Identifier(self.id_end.0 - 1)
    }
}

/// Merge the zones covering adjacent `prefixes` into a single `label` zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalesceRule {
    pub prefixes: Vec<String>,
    pub label: String,
}

impl CoalesceRule {
    pub fn new<S: Into<String>>(prefixes: impl IntoIterator<Item = S>, label: impl Into<String>) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            label: label.into(),
        }
    }

    /// The two English-language groups are drawn as one zone.
    pub fn defaults() -> Vec<Self> {
        vec![Self::new(["978-0", "978-1"], "English")]
    }

    /// Contiguous identifier span covered by the rule, if its prefixes are adjacent.
    fn span(&self) -> Option<(Identifier, Identifier)> {
        let mut ranges = self
            .prefixes
            .iter()
            .map(|p| prefix_range(p))
            .collect::<Result<Vec<_>>>()
            .ok()?;
        ranges.sort();
        let adjacent = ranges.windows(2).all(|pair| pair[0].1 == pair[1].0);
        match (adjacent, ranges.first(), ranges.last()) {
            (true, Some(first), Some(last)) => Some((first.0, last.1)),
            _ => None,
        }
    }
}

/// Apply coalesce rules to a sorted zone list. Rules whose prefixes are not
/// adjacent, or that match no zone, are skipped.
pub fn coalesce(mut zones: Vec<Zone>, rules: &[CoalesceRule]) -> Vec<Zone> {
    for rule in rules {
        let Some((start, end)) = rule.span() else {
            log::warn!("coalesce rule '{}' has non-adjacent prefixes", rule.label);
            continue;
        };
        let before = zones.len();
        zones.retain(|z| !(start <= z.id_start && z.id_end <= end));
        if zones.len() == before {
            continue;
        }
        let at = zones.partition_point(|z| z.id_start < start);
        zones.insert(at, Zone::new(start, end, rule.label.clone()));
        log::debug!(
            "coalesced {} zones into '{}'",
            before - zones.len() + 1,
            rule.label
        );
    }
    zones
}

/// A zone projected onto the pixel grid of one tier. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedZone {
    pub zone: Zone,
    pub start_row: u64,
    pub end_row: u64,
    pub start_col: u64,
    pub end_col: u64,
}

/// Static, sorted, disjoint zone table.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<Zone>,
}

impl ZoneIndex {
    /// Sort, validate and coalesce `zones`.
    pub fn new(mut zones: Vec<Zone>, rules: &[CoalesceRule]) -> Result<Self> {
        zones.sort_by_key(|z| z.id_start);
        if let Some(empty) = zones.iter().find(|z| z.id_end <= z.id_start) {
            return Err(MapError::Config(format!("zone '{}' is empty", empty.label)));
        }
        if let Some(pair) = zones.windows(2).find(|pair| pair[0].id_end > pair[1].id_start) {
            return Err(MapError::Config(format!(
                "zones '{}' and '{}' overlap",
                pair[0].label, pair[1].label
            )));
        }
        Ok(Self {
            zones: coalesce(zones, rules),
        })
    }

    /// Build from `(prefix, label)` pairs.
    pub fn from_prefixes(table: &[(&str, &str)], rules: &[CoalesceRule]) -> Result<Self> {
        let zones = table
            .iter()
            .map(|(prefix, label)| Zone::from_prefix(prefix, *label))
            .collect::<Result<Vec<_>>>()?;
        Self::new(zones, rules)
    }

    /// The built-in registration-group table.
    pub fn builtin(rules: &[CoalesceRule]) -> Result<Self> {
        Self::from_prefixes(REGISTRATION_GROUPS, rules)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone containing `id`, if it is not in an unassigned gap.
    pub fn zone_at(&self, id: Identifier) -> Option<&Zone> {
        let idx = self.zones.partition_point(|z| z.id_start <= id);
        idx.checked_sub(1)
            .map(|i| &self.zones[i])
            .filter(|z| z.contains(id))
    }

    /// Project a zone onto the tier described by `scale`.
    ///
    /// A zone confined to a single grid row keeps its column extent; anything
    /// wider covers whole tier rows.
    pub fn project(zone: &Zone, scale: &TierScale) -> ProjectedZone {
        let last = zone.last();
        let single_row = zone.id_start.0 / scale.row_width == last.0 / scale.row_width;
        let (start_col, end_col) = if single_row {
            (scale.col_of(zone.id_start), scale.col_of(last))
        } else {
            (0, scale.row_pixels().saturating_sub(1))
        };
        ProjectedZone {
            zone: zone.clone(),
            start_row: scale.row_of(zone.id_start),
            end_row: scale.row_of(last),
            start_col,
            end_col,
        }
    }

    /// Zones whose row projection intersects `[row_start, row_end]` on the
    /// tier described by `scale`, in identifier order.
    pub fn ranges_overlapping(&self, row_start: u64, row_end: u64, scale: &TierScale) -> Vec<ProjectedZone> {
        // Projected rows are monotonic in table order, so both ends can be searched.
        let first = self
            .zones
            .partition_point(|z| scale.row_of(z.last()) < row_start);
        self.zones[first..]
            .iter()
            .take_while(|z| scale.row_of(z.id_start) <= row_end)
            .map(|z| Self::project(z, scale))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::ROW_WIDTH;

    fn labels(zones: &[ProjectedZone]) -> Vec<&str> {
        zones.iter().map(|p| p.zone.label.as_str()).collect()
    }

    fn ab_index() -> ZoneIndex {
        ZoneIndex::new(
            vec![
                Zone::new(Identifier(1000), Identifier(5000), "B"),
                Zone::new(Identifier(0), Identifier(1000), "A"),
            ],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_ranges_overlapping_straddles_boundary() {
        let index = ab_index();
        let scale = TierScale::new(1, 1.0);
        assert_eq!(labels(&index.ranges_overlapping(900, 1100, &scale)), vec!["A", "B"]);
        assert_eq!(labels(&index.ranges_overlapping(0, 999, &scale)), vec!["A"]);
        assert_eq!(labels(&index.ranges_overlapping(1000, 1000, &scale)), vec!["B"]);
        assert!(index.ranges_overlapping(5000, 6000, &scale).is_empty());
    }

    #[test]
    fn test_ranges_overlapping_at_grid_row_width() {
        let native = TierScale::new(ROW_WIDTH, 1.0);
        let overview = TierScale::new(ROW_WIDTH, 50.0);

        // A spans grid rows 0..999, B rows 1000..4999.
        let rows = ZoneIndex::new(
            vec![
                Zone::new(Identifier(0), Identifier(1000 * ROW_WIDTH), "A"),
                Zone::new(Identifier(1000 * ROW_WIDTH), Identifier(5000 * ROW_WIDTH), "B"),
            ],
            &[],
        )
        .unwrap();
        assert_eq!(labels(&rows.ranges_overlapping(900, 1100, &native)), vec!["A", "B"]);
        assert_eq!(labels(&rows.ranges_overlapping(1000, 1100, &native)), vec!["B"]);
        // The same rows sit 50x higher up on the overview.
        assert!(rows.ranges_overlapping(900, 1100, &overview).is_empty());
        assert_eq!(labels(&rows.ranges_overlapping(19, 20, &overview)), vec!["A", "B"]);
        let b = &rows.ranges_overlapping(20, 20, &overview)[0];
        assert_eq!((b.start_row, b.end_row), (20, 99));

        // The small table fits inside the first grid row.
        let small = ab_index().ranges_overlapping(0, 0, &native);
        assert_eq!(labels(&small), vec!["A", "B"]);
        assert_eq!((small[0].start_col, small[0].end_col), (0, 999));
        assert_eq!((small[1].start_col, small[1].end_col), (1000, 4999));
        assert!(ab_index().ranges_overlapping(1, 10, &native).is_empty());
    }

    #[test]
    fn test_zone_at_respects_half_open_ranges() {
        let index = ab_index();
        assert_eq!(index.zone_at(Identifier(999)).unwrap().label, "A");
        assert_eq!(index.zone_at(Identifier(1000)).unwrap().label, "B");
        assert!(index.zone_at(Identifier(5000)).is_none());
    }

    #[test]
    fn test_overlapping_zones_rejected() {
        let result = ZoneIndex::new(
            vec![
                Zone::new(Identifier(0), Identifier(10), "A"),
                Zone::new(Identifier(5), Identifier(20), "B"),
            ],
            &[],
        );
        assert!(matches!(result, Err(MapError::Config(_))));
    }

    #[test]
    fn test_builtin_coalesces_english() {
        let index = ZoneIndex::builtin(&CoalesceRule::defaults()).unwrap();
        assert_eq!(index.len(), REGISTRATION_GROUPS.len() - 1);

        let english = index.zone_at(Identifier(150_000_000)).unwrap();
        assert_eq!(english.label, "English");
        assert_eq!((english.id_start, english.id_end), (Identifier(0), Identifier(200_000_000)));
        assert_eq!(index.zone_at(Identifier(250_000_000)).unwrap().label, "French");
    }

    #[test]
    fn test_non_adjacent_rule_is_skipped() {
        let rules = vec![CoalesceRule::new(["978-0", "978-2"], "Mixed")];
        let index = ZoneIndex::builtin(&rules).unwrap();
        assert_eq!(index.len(), REGISTRATION_GROUPS.len());
    }

    #[test]
    fn test_projection_rederived_per_tier() {
        let index = ZoneIndex::builtin(&CoalesceRule::defaults()).unwrap();
        let german = index.zone_at(Identifier(300_000_000)).unwrap();

        let native = ZoneIndex::project(german, &TierScale::new(ROW_WIDTH, 1.0));
        assert_eq!((native.start_row, native.end_row), (6000, 7999));
        assert_eq!((native.start_col, native.end_col), (0, 49_999));

        let mid = ZoneIndex::project(german, &TierScale::new(ROW_WIDTH, 10.0));
        assert_eq!((mid.start_row, mid.end_row), (600, 799));

        let overview = ZoneIndex::project(german, &TierScale::new(ROW_WIDTH, 50.0));
        assert_eq!((overview.start_row, overview.end_row), (120, 159));
        assert_eq!(overview.end_col, 999);
    }

    #[test]
    fn test_small_zone_keeps_column_extent() {
        let zone = Zone::new(Identifier(50_100), Identifier(50_200), "tiny");
        let projected = ZoneIndex::project(&zone, &TierScale::new(ROW_WIDTH, 1.0));
        assert_eq!((projected.start_row, projected.end_row), (1, 1));
        assert_eq!((projected.start_col, projected.end_col), (100, 199));
    }
}
