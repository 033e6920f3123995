//! ---
//! cip_section: "05-catalog"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Remote laboratory catalog and search filters."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

const LABORATORIES_JSON: &str = include_str!("../data/laboratories.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Laboratory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub institution: String,
    pub program: String,
    pub available: bool,
    /// Laboratory category, e.g. "Control CIP".
    pub kind: String,
}

/// Case-insensitive substring filters; unset or blank fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabFilter {
    pub program: Option<String>,
    /// Matched against name, description, and kind.
    pub search: Option<String>,
    pub institution: Option<String>,
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn active(term: &Option<String>) -> Option<&str> {
    term.as_deref().map(str::trim).filter(|term| !term.is_empty())
}

impl LabFilter {
    pub fn matches(&self, lab: &Laboratory) -> bool {
        let program = active(&self.program).map_or(true, |term| contains_folded(&lab.program, term));
        let institution =
            active(&self.institution).map_or(true, |term| contains_folded(&lab.institution, term));
        let search = active(&self.search).map_or(true, |term| {
            contains_folded(&lab.name, term)
                || contains_folded(&lab.description, term)
                || contains_folded(&lab.kind, term)
        });
        program && institution && search
    }
}

#[derive(Debug, Clone)]
pub struct LabCatalog {
    labs: Vec<Laboratory>,
}

impl LabCatalog {
    /// Catalog bundled with the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_json_str("laboratories.json", LABORATORIES_JSON)
    }

    pub fn from_json_str(asset: &'static str, raw: &str) -> Result<Self> {
        let labs = serde_json::from_str(raw)
            .map_err(|source| CatalogError::InvalidAsset { asset, source })?;
        Ok(Self { labs })
    }

    pub fn labs(&self) -> &[Laboratory] {
        &self.labs
    }

    pub fn filter(&self, filter: &LabFilter) -> Vec<&Laboratory> {
        self.labs.iter().filter(|lab| filter.matches(lab)).collect()
    }

    pub fn get(&self, id: &str) -> Result<&Laboratory> {
        self.labs
            .iter()
            .find(|lab| lab.id == id)
            .ok_or_else(|| CatalogError::UnknownLab(id.to_owned()))
    }

    /// Look up a lab that can host a session right now.
    pub fn open(&self, id: &str) -> Result<&Laboratory> {
        let lab = self.get(id)?;
        if !lab.available {
            return Err(CatalogError::LabUnavailable(id.to_owned()));
        }
        Ok(lab)
    }

    /// Distinct programs in catalog order.
    pub fn programs(&self) -> Vec<&str> {
        self.group_by(|lab| lab.program.as_str()).into_keys().collect()
    }

    pub fn by_institution(&self) -> IndexMap<&str, Vec<&Laboratory>> {
        self.group_by(|lab| lab.institution.as_str())
    }

    fn group_by<'a, F>(&'a self, key: F) -> IndexMap<&'a str, Vec<&'a Laboratory>>
    where
        F: Fn(&'a Laboratory) -> &'a str,
    {
        let mut groups: IndexMap<&str, Vec<&Laboratory>> = IndexMap::new();
        for lab in &self.labs {
            groups.entry(key(lab)).or_default().push(lab);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> LabCatalog {
        LabCatalog::embedded().expect("embedded catalog parses")
    }

    #[test]
    fn embedded_catalog_lists_ten_labs() {
        let catalog = catalog();
        assert_eq!(catalog.labs().len(), 10);
        assert_eq!(catalog.labs()[0].id, "cip-001");
        assert_eq!(catalog.labs().iter().filter(|lab| !lab.available).count(), 2);
    }

    #[test]
    fn search_covers_name_description_and_kind() {
        let catalog = catalog();
        let filter = LabFilter {
            search: Some("scada".into()),
            ..LabFilter::default()
        };
        let ids: Vec<&str> = catalog.filter(&filter).iter().map(|lab| lab.id.as_str()).collect();
        assert_eq!(ids, vec!["scada-001"]);

        let filter = LabFilter {
            search: Some("ROBÓTICA".into()),
            ..LabFilter::default()
        };
        assert_eq!(catalog.filter(&filter).len(), 1);
    }

    #[test]
    fn filters_combine() {
        let catalog = catalog();
        let filter = LabFilter {
            program: Some("química".into()),
            institution: Some("matanza".into()),
            search: None,
        };
        let ids: Vec<&str> = catalog.filter(&filter).iter().map(|lab| lab.id.as_str()).collect();
        assert_eq!(ids, vec!["distillation-001"]);
    }

    #[test]
    fn blank_filter_matches_everything() {
        let catalog = catalog();
        let filter = LabFilter {
            program: Some("  ".into()),
            ..LabFilter::default()
        };
        assert_eq!(catalog.filter(&filter).len(), 10);
    }

    #[test]
    fn open_rejects_unavailable_and_unknown_labs() {
        let catalog = catalog();
        assert!(catalog.open("cip-001").is_ok());
        assert!(matches!(
            catalog.open("spectro-001"),
            Err(CatalogError::LabUnavailable(_))
        ));
        assert!(matches!(catalog.get("nope"), Err(CatalogError::UnknownLab(_))));
    }

    #[test]
    fn groups_keep_catalog_order() {
        let catalog = catalog();
        let groups = catalog.by_institution();
        assert_eq!(
            groups.keys().next().copied(),
            Some("Universidad Nacional del Chaco Austral")
        );
        assert_eq!(groups.len(), 4);
        assert!(catalog.programs().contains(&"Ingeniería Industrial"));
    }
}
