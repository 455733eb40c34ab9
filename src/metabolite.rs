use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::BufRead;
use std::path::Path;

use tracing::{debug, info};

use crate::domain::MetaboliteCrossRefs;
use crate::error::HmdbError;
use crate::fs_util::open_xml_source;
use crate::xml::{Element, RecordReader};

/// Accession -> cross-reference identifiers, built from the metabolite export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaboliteIndex {
    entries: HashMap<String, MetaboliteCrossRefs>,
}

impl MetaboliteIndex {
    pub fn from_path(path: &Path) -> Result<Self, HmdbError> {
        Self::from_reader(open_xml_source(path)?)
    }

    /// Reads every `<metabolite>` record. A record without accession text
    /// aborts the build; when an accession repeats, the first record wins.
    pub fn from_reader<R: BufRead>(source: R) -> Result<Self, HmdbError> {
        let mut index = Self::default();
        for (position, record) in RecordReader::new(source, "metabolite").enumerate() {
            let record = record?;
            let label = format!("metabolite #{}", position + 1);
            let (accession, cross_refs) = parse_metabolite(&record, &label)?;
            index.insert(accession, cross_refs);
        }
        info!(entries = index.len(), "metabolite index built");
        Ok(index)
    }

    /// Returns `false` when the accession was already present.
    pub fn insert(&mut self, accession: String, cross_refs: MetaboliteCrossRefs) -> bool {
        match self.entries.entry(accession) {
            Entry::Occupied(existing) => {
                debug!(accession = %existing.key(), "duplicate metabolite accession ignored");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(cross_refs);
                true
            }
        }
    }

    pub fn get(&self, accession: &str) -> Option<&MetaboliteCrossRefs> {
        self.entries.get(accession)
    }

    pub fn contains(&self, accession: &str) -> bool {
        self.entries.contains_key(accession)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaboliteCrossRefs)> {
        self.entries
            .iter()
            .map(|(accession, refs)| (accession.as_str(), refs))
    }
}

fn parse_metabolite(
    record: &Element,
    label: &str,
) -> Result<(String, MetaboliteCrossRefs), HmdbError> {
    let accession = record.require_text(label, "accession")?.to_string();
    let cross_refs = MetaboliteCrossRefs {
        kegg_id: record.child_text_or_empty("kegg_id").to_string(),
        chemspider_id: record.child_text_or_empty("chemspider_id").to_string(),
        chebi_id: record.child_text_or_empty("chebi_id").to_string(),
        pubchem_compound_id: record.child_text_or_empty("pubchem_compound_id").to_string(),
    };
    Ok((accession, cross_refs))
}
