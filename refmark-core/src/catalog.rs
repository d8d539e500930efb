use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A phrase the user can jump to, as listed in the analysis panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: u32,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "targetPhrase")]
    pub target_phrase: String,
    #[serde(default, alias = "pageNumber")]
    pub page_number: Option<u32>,
}

impl Reference {
    pub fn new(id: u32, description: impl Into<String>, target_phrase: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            target_phrase: target_phrase.into(),
            page_number: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlCatalog {
    #[serde(default, rename = "reference")]
    references: Vec<Reference>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonCatalog {
    List(Vec<Reference>),
    Wrapped { references: Vec<Reference> },
}

/// Ordered, validated set of references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCatalog {
    references: Vec<Reference>,
}

impl ReferenceCatalog {
    pub fn new(references: Vec<Reference>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for reference in &references {
            if reference.id == 0 {
                return Err(CatalogError::InvalidId(reference.id));
            }
            if !seen.insert(reference.id) {
                return Err(CatalogError::DuplicateId(reference.id));
            }
            if reference.target_phrase.is_empty() {
                return Err(CatalogError::EmptyPhrase(reference.id));
            }
        }
        Ok(Self { references })
    }

    /// Parses `[[reference]]` tables.
    pub fn from_toml_str(input: &str) -> Result<Self, CatalogError> {
        let parsed: TomlCatalog = toml::from_str(input)?;
        Self::new(parsed.references)
    }

    /// Parses either a bare array or `{ "references": [...] }`.
    pub fn from_json_str(input: &str) -> Result<Self, CatalogError> {
        let references = match serde_json::from_str(input)? {
            JsonCatalog::List(references) => references,
            JsonCatalog::Wrapped { references } => references,
        };
        Self::new(references)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            Some("json") => Self::from_json_str(&contents),
            _ => Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn get(&self, id: u32) -> Option<&Reference> {
        self.references.iter().find(|reference| reference.id == id)
    }

    pub fn as_slice(&self) -> &[Reference] {
        &self.references
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TOML_CATALOG: &str = r#"
[[reference]]
id = 1
description = "Strategic asset management"
target_phrase = "assets"

[[reference]]
id = 2
description = "Review Q2 2025"
target_phrase = "Revenue increased"
page_number = 4
"#;

    #[test]
    fn toml_catalog_keeps_declaration_order() {
        let catalog = ReferenceCatalog::from_toml_str(TOML_CATALOG).unwrap();
        let ids: Vec<_> = catalog.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(catalog.get(2).unwrap().page_number, Some(4));
        assert!(catalog.get(3).is_none());
    }

    #[test]
    fn json_catalog_accepts_camel_case_fields() {
        let json = r#"[
            {"id": 2, "description": "Strategic asset management", "targetPhrase": "assets", "pageNumber": null},
            {"id": 4, "description": "Highlights Q2 2025", "targetPhrase": "EBITDA increase"}
        ]"#;
        let catalog = ReferenceCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(4).unwrap().target_phrase, "EBITDA increase");

        let wrapped = r#"{"references": [{"id": 1, "target_phrase": "assets"}]}"#;
        let catalog = ReferenceCatalog::from_json_str(wrapped).unwrap();
        assert_eq!(catalog.get(1).unwrap().description, "");
    }

    #[test]
    fn validation_rejects_bad_ids_and_phrases() {
        let duplicate = vec![
            Reference::new(1, "a", "x"),
            Reference::new(1, "b", "y"),
        ];
        assert!(matches!(
            ReferenceCatalog::new(duplicate),
            Err(CatalogError::DuplicateId(1))
        ));
        assert!(matches!(
            ReferenceCatalog::new(vec![Reference::new(0, "a", "x")]),
            Err(CatalogError::InvalidId(0))
        ));
        assert!(matches!(
            ReferenceCatalog::new(vec![Reference::new(5, "a", "")]),
            Err(CatalogError::EmptyPhrase(5))
        ));
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempdir().unwrap();
        let toml_path = dir.path().join("refs.toml");
        std::fs::write(&toml_path, TOML_CATALOG).unwrap();
        assert_eq!(ReferenceCatalog::load(&toml_path).unwrap().len(), 2);

        let yaml_path = dir.path().join("refs.yaml");
        std::fs::write(&yaml_path, "").unwrap();
        assert!(matches!(
            ReferenceCatalog::load(&yaml_path),
            Err(CatalogError::UnsupportedFormat(_))
        ));

        assert!(matches!(
            ReferenceCatalog::load(&dir.path().join("missing.toml")),
            Err(CatalogError::Io { .. })
        ));
    }
}
