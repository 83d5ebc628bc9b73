use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const PEPTIDE_INDEX_FILE: &str = "peptides.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peptide {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Only rendered for subscribers
    #[serde(default)]
    pub paid_sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct IndexFile {
    #[serde(default)]
    peptides: Vec<Peptide>,
}

/// Pre-built content, loaded once at startup and sorted by name.
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    peptides: Vec<Peptide>,
}

impl ContentIndex {
    pub fn new(mut peptides: Vec<Peptide>) -> Self {
        peptides.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Self { peptides }
    }

    /// A missing index is not fatal; the site runs with no content.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(PEPTIDE_INDEX_FILE);
        if !path.exists() {
            tracing::warn!("No content index at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)?;
        let file: IndexFile = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid content index {}: {}", path.display(), e))?;
        tracing::info!("Loaded {} peptides from {}", file.peptides.len(), path.display());
        Ok(Self::new(file.peptides))
    }

    pub fn peptides(&self) -> &[Peptide] {
        &self.peptides
    }

    pub fn len(&self) -> usize {
        self.peptides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peptides.is_empty()
    }

    /// Matches the slug or any alias, case-insensitively.
    pub fn get(&self, slug: &str) -> Option<&Peptide> {
        let slug = slug.to_ascii_lowercase();
        self.peptides.iter().find(|p| {
            p.slug == slug || p.aliases.iter().any(|a| a.to_ascii_lowercase() == slug)
        })
    }

    pub fn by_category<'a>(&'a self, category: Option<&'a str>) -> impl Iterator<Item = &'a Peptide> {
        self.peptides.iter().filter(move |p| match category {
            Some(c) => p.category.eq_ignore_ascii_case(c),
            None => true,
        })
    }

    pub fn categories(&self) -> Vec<String> {
        self.peptides
            .iter()
            .filter(|p| !p.category.is_empty())
            .map(|p| p.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peptide(slug: &str, name: &str, category: &str) -> Peptide {
        Peptide {
            slug: slug.into(),
            name: name.into(),
            category: category.into(),
            summary: String::new(),
            aliases: vec![],
            sections: vec![],
            paid_sections: vec![],
        }
    }

    #[test]
    fn missing_index_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let index = ContentIndex::load(tmp.path()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn malformed_index_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(PEPTIDE_INDEX_FILE), "{ not json").unwrap();
        assert!(ContentIndex::load(tmp.path()).is_err());
    }

    #[test]
    fn load_sorts_and_resolves_aliases() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(PEPTIDE_INDEX_FILE),
            r#"{"peptides":[
                {"slug":"tb-500","name":"TB-500","category":"Repair","aliases":["thymosin-beta-4"]},
                {"slug":"bpc-157","name":"BPC-157","category":"Repair"}
            ]}"#,
        )
        .unwrap();

        let index = ContentIndex::load(tmp.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.peptides()[0].slug, "bpc-157");
        assert_eq!(index.get("Thymosin-Beta-4").unwrap().slug, "tb-500");
        assert!(index.get("unobtainium").is_none());
    }

    #[test]
    fn category_filter_and_listing() {
        let index = ContentIndex::new(vec![
            peptide("a", "Alpha", "Metabolic"),
            peptide("b", "Beta", "Repair"),
            peptide("c", "Gamma", "repair"),
        ]);
        assert_eq!(index.by_category(Some("REPAIR")).count(), 2);
        assert_eq!(index.by_category(None).count(), 3);
        assert_eq!(index.categories(), vec!["Metabolic", "Repair", "repair"]);
    }
}
