//! Scenario catalog: built-in procedures plus user-supplied YAML

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{VerifyError, VerifyResult};
use crate::scenario::Scenario;

const BUILTIN: &[(&str, &str)] = &[
    ("debug-ids.yaml", include_str!("../scenarios/debug-ids.yaml")),
    ("customer-departure.yaml", include_str!("../scenarios/customer-departure.yaml")),
    ("critic-display.yaml", include_str!("../scenarios/critic-display.yaml")),
    ("debug-mode.yaml", include_str!("../scenarios/debug-mode.yaml")),
    ("help-modal.yaml", include_str!("../scenarios/help-modal.yaml")),
    ("critic-absent.yaml", include_str!("../scenarios/critic-absent.yaml")),
    ("score-hud.yaml", include_str!("../scenarios/score-hud.yaml")),
];

/// Ordered set of scenarios with unique names
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scenarios: Vec<Scenario>,
}

impl Catalog {
    /// Scenarios shipped with the crate
    pub fn builtin() -> VerifyResult<Self> {
        let mut catalog = Self::default();
        for (file, yaml) in BUILTIN {
            let scenario = Scenario::from_yaml(yaml)
                .map_err(|e| VerifyError::ScenarioParse(format!("built-in {}: {}", file, e)))?;
            catalog.insert(scenario);
        }
        Ok(catalog)
    }

    /// Load every `.yaml`/`.yml` file under a directory
    pub fn load_dir(dir: &Path) -> VerifyResult<Self> {
        if !dir.is_dir() {
            return Err(VerifyError::Config(format!(
                "scenario directory not found: {}",
                dir.display()
            )));
        }

        let mut catalog = Self::default();
        let mut entries: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        for entry in entries {
            debug!(path = %entry.path().display(), "loading scenario");
            let scenario = Scenario::from_file(entry.path())?;
            if catalog.get(&scenario.name).is_some() {
                warn!("Duplicate scenario '{}' in {}, later file wins", scenario.name, dir.display());
            }
            catalog.insert(scenario);
        }

        Ok(catalog)
    }

    /// Add scenarios from `other`; same-named ones replace existing entries
    pub fn merge(&mut self, other: Catalog) {
        for scenario in other.scenarios {
            self.insert(scenario);
        }
    }

    fn insert(&mut self, scenario: Scenario) {
        match self.scenarios.iter_mut().find(|s| s.name == scenario.name) {
            Some(existing) => *existing = scenario,
            None => self.scenarios.push(scenario),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Scenario> + 'a {
        self.scenarios.iter().filter(move |s| s.has_tag(tag))
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Pick scenarios by explicit names (in the given order), then narrow by tag.
    /// No names means every scenario.
    pub fn select(&self, names: &[String], tag: Option<&str>) -> VerifyResult<Vec<Scenario>> {
        let picked: Vec<&Scenario> = if names.is_empty() {
            self.scenarios.iter().collect()
        } else {
            names
                .iter()
                .map(|n| self.get(n).ok_or_else(|| VerifyError::UnknownScenario(n.clone())))
                .collect::<VerifyResult<_>>()?
        };

        Ok(picked
            .into_iter()
            .filter(|s| tag.map(|t| s.has_tag(t)).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_contents() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.len(), 7);
        assert_eq!(
            catalog.names(),
            vec![
                "debug-ids",
                "customer-departure",
                "critic-display",
                "debug-mode",
                "help-modal",
                "critic-absent",
                "score-hud",
            ]
        );
    }

    #[test]
    fn test_select_by_tag() {
        let catalog = Catalog::builtin().unwrap();
        let smoke = catalog.select(&[], Some("smoke")).unwrap();
        let names: Vec<_> = smoke.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["help-modal", "critic-absent", "score-hud"]);
    }

    #[test]
    fn test_select_unknown_name() {
        let catalog = Catalog::builtin().unwrap();
        let err = catalog.select(&["nope".to_string()], None).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownScenario(name) if name == "nope"));
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let catalog = Catalog::builtin().unwrap();
        let picked = catalog
            .select(&["score-hud".to_string(), "debug-ids".to_string()], None)
            .unwrap();
        assert_eq!(picked[0].name, "score-hud");
        assert_eq!(picked[1].name, "debug-ids");
    }

    #[test]
    fn test_load_dir_and_merge_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("nested/help.yml"),
            "name: help-modal\ntags: [custom]\nsteps:\n  - action: screenshot\n    name: mine\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = Catalog::load_dir(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);

        let mut catalog = Catalog::builtin().unwrap();
        catalog.merge(loaded);
        assert_eq!(catalog.len(), 7);
        let help = catalog.get("help-modal").unwrap();
        assert!(help.has_tag("custom"));
        assert_eq!(help.screenshot_names(), vec!["mine".to_string()]);
    }

    #[test]
    fn test_load_missing_dir() {
        let err = Catalog::load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, VerifyError::Config(_)));
    }
}
