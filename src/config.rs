use crate::derive::{PriceModel, UNIT_SCALE};
use crate::record::RecordKind;
use crate::view::{SortDirection, SortSpec, ViewState};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub unit_scale: f64,
    pub record_kind: RecordKind,
    pub facet: Option<String>,
    pub sort_field: String,
    pub sort_direction: SortDirection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unit_scale: UNIT_SCALE,
            record_kind: RecordKind::ShipLoss,
            facet: None,
            sort_field: "opportunity_score".to_string(),
            sort_direction: SortDirection::Descending,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unparsable values fall back to
    /// the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            unit_scale: lookup("UNIT_SCALE")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(d.unit_scale),
            record_kind: lookup("RECORD_KIND")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.record_kind),
            facet: lookup("FACET").filter(|v| !v.is_empty()),
            sort_field: lookup("SORT_FIELD")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(d.sort_field),
            sort_direction: lookup("SORT_DIR")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.sort_direction),
        }
    }

    /// Replaces the sort field, keeping the configured direction. Blank
    /// fields are ignored.
    pub fn with_sort_field(mut self, field: &str) -> Self {
        if !field.trim().is_empty() {
            self.sort_field = field.to_string();
        }
        self
    }

    pub fn price_model(&self) -> PriceModel {
        PriceModel::new(self.unit_scale)
    }

    pub fn view_state(&self) -> ViewState {
        ViewState::new(
            self.facet.clone(),
            SortSpec::new(self.sort_field.clone(), self.sort_direction),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.price_model().unit_scale, 1_000_000.0);
    }

    #[test]
    fn test_reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("UNIT_SCALE", "250"),
            ("RECORD_KIND", "top_ship"),
            ("FACET", "Frigate"),
            ("SORT_FIELD", "name"),
            ("SORT_DIR", "asc"),
        ]));
        assert_eq!(cfg.unit_scale, 250.0);
        assert_eq!(cfg.record_kind, RecordKind::TopShip);
        let state = cfg.view_state();
        assert_eq!(state.facet.as_deref(), Some("Frigate"));
        assert_eq!(state.sort, SortSpec::new("name", SortDirection::Ascending));
    }

    #[test]
    fn test_sort_field_override_keeps_direction() {
        let cfg = Config::default().with_sort_field("opportunity_score");
        assert_eq!(
            cfg.view_state().sort,
            SortSpec::new("opportunity_score", SortDirection::Descending)
        );

        let cfg = Config::default().with_sort_field("name");
        assert_eq!(cfg.view_state().sort, SortSpec::new("name", SortDirection::Descending));

        let cfg = Config::from_lookup(lookup(&[("SORT_DIR", "asc")])).with_sort_field("hull_gap");
        assert_eq!(cfg.view_state().sort, SortSpec::new("hull_gap", SortDirection::Ascending));

        assert_eq!(Config::default().with_sort_field("  "), Config::default());
    }

    #[test]
    fn test_bad_values_fall_back() {
        let cfg = Config::from_lookup(lookup(&[
            ("UNIT_SCALE", "-3"),
            ("RECORD_KIND", "bookmarks"),
            ("FACET", ""),
            ("SORT_DIR", "sideways"),
        ]));
        assert_eq!(cfg, Config::default());
    }
}
