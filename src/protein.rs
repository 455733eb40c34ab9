//! Association extraction from the HMDB protein export.
//!
//! Each `<protein>` yields documents for its literature-backed
//! `metabolite_references` first, then for its plain
//! `metabolite_associations`. Plain associations whose metabolite has already
//! been emitted anywhere earlier in the run are suppressed; the run-scoped
//! [`SeenAccessions`] set carries that state from protein to protein.

use std::collections::{HashSet, VecDeque};
use std::io::BufRead;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{
    AssociationDocument, MalformedPolicy, MetaboliteCrossRefs, MetaboliteObject, Pmid, Subject,
    document_id,
};
use crate::error::HmdbError;
use crate::metabolite::MetaboliteIndex;
use crate::xml::{Element, RecordReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaboliteRef {
    pub accession: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteratureReference {
    pub metabolite: MetaboliteRef,
    pub pmid: Pmid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProteinEntry {
    pub accession: String,
    pub subject: Subject,
    pub references: Vec<LiteratureReference>,
    pub associations: Vec<MetaboliteRef>,
}

impl ProteinEntry {
    /// `position` is 1-based and only used to name entries that lack an
    /// accession in error messages.
    pub fn from_element(element: &Element, position: usize) -> Result<Self, HmdbError> {
        let accession = element
            .require_text(&format!("protein #{position}"), "accession")?
            .to_string();
        let label = format!("protein {accession}");
        let references_el = element.require_child(&label, "metabolite_references")?;
        let associations_el = element.require_child(&label, "metabolite_associations")?;

        let reference_label = format!("metabolite_reference in {label}");
        let references = references_el
            .elements()
            .iter()
            .map(|entry| {
                let metabolite = entry.require_child(&reference_label, "metabolite")?;
                let metabolite = parse_metabolite_ref(metabolite, &reference_label)?;
                let pmid = Pmid::from_text(
                    entry
                        .child("reference")
                        .and_then(|reference| reference.child_text("pubmed_id")),
                );
                Ok::<_, HmdbError>(LiteratureReference { metabolite, pmid })
            })
            .collect::<Result<Vec<_>, HmdbError>>()?;

        let association_label = format!("metabolite_associations in {label}");
        let associations = associations_el
            .children_named("metabolite")
            .map(|metabolite| parse_metabolite_ref(metabolite, &association_label))
            .collect::<Result<Vec<_>, HmdbError>>()?;

        Ok(Self {
            subject: parse_subject(element),
            accession,
            references,
            associations,
        })
    }
}

fn parse_metabolite_ref(element: &Element, label: &str) -> Result<MetaboliteRef, HmdbError> {
    Ok(MetaboliteRef {
        accession: element.require_text(label, "accession")?.to_string(),
        name: element.child_text_or_empty("name").to_string(),
    })
}

fn parse_subject(element: &Element) -> Subject {
    let field = |name: &str| element.child_text_or_empty(name).to_string();
    Subject {
        protein_type: field("protein_type"),
        uniprot_id: field("uniprot_id"),
        uniprot_name: field("uniprot_name"),
        genbank_protein_id: field("genbank_protein_id"),
        hgnc_id: field("hgnc_id"),
        genbank_gene_id: field("genbank_gene_id"),
        gene_name: field("gene_name"),
    }
}

/// Metabolite accessions already emitted during one extraction run.
#[derive(Debug, Clone, Default)]
pub struct SeenAccessions {
    accessions: HashSet<String>,
}

impl SeenAccessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, accession: &str) {
        if !self.accessions.contains(accession) {
            self.accessions.insert(accession.to_string());
        }
    }

    pub fn contains(&self, accession: &str) -> bool {
        self.accessions.contains(accession)
    }

    pub fn len(&self) -> usize {
        self.accessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessions.is_empty()
    }
}

/// Builds the documents for one protein. Sequence numbers advance only when
/// a document is actually produced.
pub fn extract_protein(
    protein: &ProteinEntry,
    index: &MetaboliteIndex,
    seen: &mut SeenAccessions,
) -> Vec<AssociationDocument> {
    let mut documents = Vec::new();
    let mut sequence = 1;

    for reference in &protein.references {
        let accession = reference.metabolite.accession.as_str();
        let Some(cross_refs) = index.get(accession) else {
            debug!(protein = %protein.accession, accession, "unresolved metabolite reference dropped");
            continue;
        };
        documents.push(build_document(
            protein,
            sequence,
            reference.pmid.clone(),
            &reference.metabolite,
            cross_refs,
        ));
        sequence += 1;
        seen.mark(accession);
    }

    for association in &protein.associations {
        let accession = association.accession.as_str();
        if seen.contains(accession) {
            debug!(protein = %protein.accession, accession, "duplicate metabolite association skipped");
            continue;
        }
        let Some(cross_refs) = index.get(accession) else {
            debug!(protein = %protein.accession, accession, "unresolved metabolite association dropped");
            continue;
        };
        documents.push(build_document(
            protein,
            sequence,
            Pmid::Unknown,
            association,
            cross_refs,
        ));
        sequence += 1;
        seen.mark(accession);
    }

    documents
}

fn build_document(
    protein: &ProteinEntry,
    sequence: usize,
    pmid: Pmid,
    metabolite: &MetaboliteRef,
    cross_refs: &MetaboliteCrossRefs,
) -> AssociationDocument {
    AssociationDocument {
        id: document_id(&protein.accession, sequence),
        pmid,
        subject: protein.subject.clone(),
        object: MetaboliteObject::new(&metabolite.accession, &metabolite.name, cross_refs),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub proteins: usize,
    pub skipped_proteins: usize,
    pub documents: usize,
}

/// Lazy producer of association documents over a protein export.
///
/// Protein subtrees are parsed one at a time and their documents are handed
/// out before the next protein is read. After the first error the iterator
/// is exhausted.
pub struct AssociationExtractor<'a, R: BufRead> {
    records: RecordReader<R>,
    index: &'a MetaboliteIndex,
    seen: SeenAccessions,
    pending: VecDeque<AssociationDocument>,
    policy: MalformedPolicy,
    limit: Option<usize>,
    position: usize,
    stats: ExtractionStats,
    done: bool,
}

impl<'a, R: BufRead> AssociationExtractor<'a, R> {
    pub fn new(source: R, index: &'a MetaboliteIndex) -> Self {
        Self {
            records: RecordReader::new(source, "protein"),
            index,
            seen: SeenAccessions::new(),
            pending: VecDeque::new(),
            policy: MalformedPolicy::default(),
            limit: None,
            position: 0,
            stats: ExtractionStats::default(),
            done: false,
        }
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stop after this many protein entries.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    pub fn seen(&self) -> &SeenAccessions {
        &self.seen
    }

    fn fail(&mut self, err: HmdbError) -> Option<Result<AssociationDocument, HmdbError>> {
        self.done = true;
        self.pending.clear();
        Some(Err(err))
    }

    fn finish(&mut self) -> Option<Result<AssociationDocument, HmdbError>> {
        if !self.done {
            self.done = true;
            info!(
                proteins = self.stats.proteins,
                skipped = self.stats.skipped_proteins,
                documents = self.stats.documents,
                "protein traversal finished"
            );
        }
        None
    }
}

impl<R: BufRead> Iterator for AssociationExtractor<'_, R> {
    type Item = Result<AssociationDocument, HmdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(document) = self.pending.pop_front() {
                self.stats.documents += 1;
                return Some(Ok(document));
            }
            if self.limit.is_some_and(|limit| self.position >= limit) {
                return self.finish();
            }
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(err)) => return self.fail(err),
                None => return self.finish(),
            };
            self.position += 1;

            match ProteinEntry::from_element(&record, self.position) {
                Ok(protein) => {
                    self.stats.proteins += 1;
                    let documents = extract_protein(&protein, self.index, &mut self.seen);
                    self.pending.extend(documents);
                }
                Err(err) if err.is_structural() && self.policy == MalformedPolicy::Skip => {
                    warn!(error = %err, "skipping malformed protein entry");
                    self.stats.skipped_proteins += 1;
                }
                Err(err) => return self.fail(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(accessions: &[&str]) -> MetaboliteIndex {
        let mut index = MetaboliteIndex::default();
        for accession in accessions {
            index.insert(accession.to_string(), MetaboliteCrossRefs::default());
        }
        index
    }

    fn protein(references: &[&str], associations: &[&str]) -> ProteinEntry {
        let metabolite = |accession: &&str| MetaboliteRef {
            accession: accession.to_string(),
            name: String::new(),
        };
        ProteinEntry {
            accession: "HMDBP00001".to_string(),
            subject: Subject::default(),
            references: references
                .iter()
                .map(|accession| LiteratureReference {
                    metabolite: metabolite(accession),
                    pmid: Pmid::Cited("1".to_string()),
                })
                .collect(),
            associations: associations.iter().map(metabolite).collect(),
        }
    }

    fn ids(documents: &[AssociationDocument]) -> Vec<&str> {
        documents.iter().map(|doc| doc.id.as_str()).collect()
    }

    #[test]
    fn counter_skips_unresolved_references() {
        let index = index_with(&["A", "C", "D"]);
        let mut seen = SeenAccessions::new();
        let docs = extract_protein(&protein(&["A", "B", "C"], &["X", "D"]), &index, &mut seen);
        assert_eq!(ids(&docs), ["HMDBP00001_1", "HMDBP00001_2", "HMDBP00001_3"]);
        assert_eq!(docs[1].object.accession, "C");
        assert_eq!(docs[2].object.accession, "D");
        assert!(docs[2].pmid.is_unknown());
        assert!(!seen.contains("B"));
        assert!(!seen.contains("X"));
    }

    #[test]
    fn counter_skips_duplicate_associations() {
        let index = index_with(&["A", "B"]);
        let mut seen = SeenAccessions::new();
        let docs = extract_protein(&protein(&["A"], &["A", "B", "B"]), &index, &mut seen);
        assert_eq!(ids(&docs), ["HMDBP00001_1", "HMDBP00001_2"]);
        assert_eq!(docs[0].pmid, Pmid::Cited("1".to_string()));
        assert_eq!(docs[1].object.accession, "B");
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn literature_references_ignore_seen_set() {
        let index = index_with(&["A"]);
        let mut seen = SeenAccessions::new();
        seen.mark("A");
        let docs = extract_protein(&protein(&["A"], &["A"]), &index, &mut seen);
        assert_eq!(ids(&docs), ["HMDBP00001_1"]);
        assert!(!docs[0].pmid.is_unknown());
    }

    #[test]
    fn entry_without_reference_has_missing_pmid() {
        let element = Element::new("protein")
            .with_child(Element::new("accession").with_text("HMDBP00009"))
            .with_child(
                Element::new("metabolite_references").with_child(
                    Element::new("metabolite_reference")
                        .with_child(
                            Element::new("metabolite")
                                .with_child(Element::new("accession").with_text("HMDB0000005")),
                        )
                        .with_child(
                            Element::new("reference")
                                .with_child(Element::new("reference_text").with_text("x")),
                        ),
                ),
            )
            .with_child(Element::new("metabolite_associations"));
        let entry = ProteinEntry::from_element(&element, 1).unwrap();
        assert_eq!(entry.references.len(), 1);
        assert_eq!(entry.references[0].pmid, Pmid::Missing);
        assert_eq!(entry.references[0].metabolite.name, "");
        assert_eq!(entry.subject, Subject::default());
    }
}
