use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};

/// Pmid value carried by associations that have no supporting citation.
pub const UNKNOWN_PMID: &str = "Unknown";

/// External database identifiers attached to a metabolite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaboliteCrossRefs {
    pub kegg_id: String,
    pub chemspider_id: String,
    pub chebi_id: String,
    pub pubchem_compound_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pmid {
    /// Identifier text of the supporting publication.
    Cited(String),
    /// A literature reference exists but carries no identifier.
    Missing,
    /// Plain association without any literature reference.
    Unknown,
}

impl Pmid {
    pub fn from_text(text: Option<&str>) -> Self {
        match text {
            Some(value) => Pmid::Cited(value.to_string()),
            None => Pmid::Missing,
        }
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Pmid::Cited(value) => Some(value),
            Pmid::Missing => None,
            Pmid::Unknown => Some(UNKNOWN_PMID),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Pmid::Unknown)
    }
}

impl Serialize for Pmid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_deref() {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub protein_type: String,
    pub uniprot_id: String,
    pub uniprot_name: String,
    pub genbank_protein_id: String,
    pub hgnc_id: String,
    pub genbank_gene_id: String,
    pub gene_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetaboliteObject {
    pub accession: String,
    pub name: String,
    pub kegg_id: String,
    pub chemspider_id: String,
    pub chebi_id: String,
    pub pubchem_compound_id: String,
}

impl MetaboliteObject {
    pub fn new(accession: &str, name: &str, cross_refs: &MetaboliteCrossRefs) -> Self {
        Self {
            accession: accession.to_string(),
            name: name.to_string(),
            kegg_id: cross_refs.kegg_id.clone(),
            chemspider_id: cross_refs.chemspider_id.clone(),
            chebi_id: cross_refs.chebi_id.clone(),
            pubchem_compound_id: cross_refs.pubchem_compound_id.clone(),
        }
    }
}

/// One protein-metabolite association, ready for bulk loading.
///
/// The document store keys documents on `_id`, so `id` is serialized under
/// that name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub pmid: Pmid,
    pub subject: Subject,
    pub object: MetaboliteObject,
}

pub fn document_id(protein_accession: &str, sequence: usize) -> String {
    format!("{protein_accession}_{sequence}")
}

/// What to do with a protein entry that lacks a required element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    #[default]
    Fail,
    Skip,
}

impl fmt::Display for MalformedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedPolicy::Fail => write!(f, "fail"),
            MalformedPolicy::Skip => write!(f, "skip"),
        }
    }
}
