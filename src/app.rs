use std::io::BufRead;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::domain::MetaboliteCrossRefs;
use crate::error::HmdbError;
use crate::fs_util::open_xml_source;
use crate::metabolite::MetaboliteIndex;
use crate::output::DocumentSink;
use crate::protein::AssociationExtractor;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub protein_source: String,
    pub metabolite_source: String,
    pub output: Option<String>,
    pub metabolites_indexed: usize,
    pub proteins: usize,
    pub skipped_proteins: usize,
    pub documents: usize,
    pub literature_documents: usize,
    pub unknown_pmid_documents: usize,
    pub distinct_accessions: usize,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub metabolite_source: String,
    pub entries: usize,
    pub with_kegg_id: usize,
    pub with_chemspider_id: usize,
    pub with_chebi_id: usize,
    pub with_pubchem_compound_id: usize,
    pub generated_at: String,
}

impl IndexSummary {
    pub fn from_index(source: &str, index: &MetaboliteIndex) -> Self {
        Self {
            metabolite_source: source.to_string(),
            entries: index.len(),
            with_kegg_id: count_present(index, |refs| refs.kegg_id.as_str()),
            with_chemspider_id: count_present(index, |refs| refs.chemspider_id.as_str()),
            with_chebi_id: count_present(index, |refs| refs.chebi_id.as_str()),
            with_pubchem_compound_id: count_present(index, |refs| {
                refs.pubchem_compound_id.as_str()
            }),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn count_present(
    index: &MetaboliteIndex,
    pick: impl Fn(&MetaboliteCrossRefs) -> &str,
) -> usize {
    index
        .iter()
        .filter(|(_, refs)| !pick(refs).is_empty())
        .count()
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress events to the `tracing` subscriber.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct App {
    config: ResolvedConfig,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn build_index(&self, sink: &dyn ProgressSink) -> Result<MetaboliteIndex, HmdbError> {
        let path = &self.config.metabolite_path;
        sink.event(ProgressEvent {
            message: format!("phase=Index; reading {path}"),
            elapsed: None,
        });
        let start = Instant::now();
        let index = MetaboliteIndex::from_path(path.as_std_path())?;
        sink.event(ProgressEvent {
            message: format!("phase=Index; {} metabolites indexed", index.len()),
            elapsed: Some(start.elapsed()),
        });
        Ok(index)
    }

    pub fn index(&self, sink: &dyn ProgressSink) -> Result<IndexSummary, HmdbError> {
        let index = self.build_index(sink)?;
        Ok(IndexSummary::from_index(
            self.config.metabolite_path.as_str(),
            &index,
        ))
    }

    /// Builds the metabolite index, then streams every association document
    /// of the protein export into `documents`.
    pub fn run(
        &self,
        documents: &mut dyn DocumentSink,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, HmdbError> {
        let index = self.build_index(sink)?;
        let path = &self.config.protein_path;
        sink.event(ProgressEvent {
            message: format!("phase=Extract; reading {path}"),
            elapsed: None,
        });
        let source = open_xml_source(path.as_std_path())?;
        self.extract(source, &index, documents, sink)
    }

    pub fn extract<R: BufRead>(
        &self,
        proteins: R,
        index: &MetaboliteIndex,
        documents: &mut dyn DocumentSink,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, HmdbError> {
        let start = Instant::now();
        let mut extractor = AssociationExtractor::new(proteins, index)
            .with_policy(self.config.on_malformed)
            .with_limit(self.config.limit);

        let mut literature_documents = 0;
        let mut unknown_pmid_documents = 0;
        for document in extractor.by_ref() {
            let document = document?;
            if document.pmid.is_unknown() {
                unknown_pmid_documents += 1;
            } else {
                literature_documents += 1;
            }
            documents.accept(&document)?;
        }
        documents.finish()?;

        let stats = extractor.stats();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Extract; {} documents from {} proteins",
                stats.documents, stats.proteins
            ),
            elapsed: Some(start.elapsed()),
        });

        Ok(RunSummary {
            protein_source: self.config.protein_path.to_string(),
            metabolite_source: self.config.metabolite_path.to_string(),
            output: self.config.output.as_ref().map(|path| path.to_string()),
            metabolites_indexed: index.len(),
            proteins: stats.proteins,
            skipped_proteins: stats.skipped_proteins,
            documents: stats.documents,
            literature_documents,
            unknown_pmid_documents,
            distinct_accessions: extractor.seen().len(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
