use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use hmdb_associations::app::{App, ProgressEvent, ProgressSink};
use hmdb_associations::config::{Config, ConfigLoader};
use hmdb_associations::domain::{AssociationDocument, MalformedPolicy};
use hmdb_associations::error::HmdbError;
use hmdb_associations::output::{AtomicFileSink, DocumentSink};

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

fn fixture_app(output: Option<Utf8PathBuf>) -> App {
    let config = Config {
        data_folder: Some("tests/fixtures".to_string()),
        output: output.map(|path| path.to_string()),
        ..Config::default()
    };
    App::new(ConfigLoader::resolve_config(config).unwrap())
}

#[test]
fn run_collects_documents_and_summary() {
    let app = fixture_app(None);
    let mut documents: Vec<AssociationDocument> = Vec::new();
    let summary = app.run(&mut documents, &NoopSink).unwrap();

    assert_eq!(documents.len(), 5);
    assert_eq!(summary.documents, 5);
    assert_eq!(summary.proteins, 2);
    assert_eq!(summary.skipped_proteins, 0);
    assert_eq!(summary.metabolites_indexed, 4);
    assert_eq!(summary.literature_documents, 3);
    assert_eq!(summary.unknown_pmid_documents, 2);
    assert_eq!(summary.distinct_accessions, 4);
    assert!(summary.protein_source.ends_with("hmdb_proteins.xml"));
}

#[test]
fn run_writes_json_lines_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let output = Utf8PathBuf::from_path_buf(dir.path().join("out/associations.jsonl")).unwrap();
    let app = fixture_app(Some(output.clone()));

    let mut sink = AtomicFileSink::create(&output).unwrap();
    app.run(&mut sink, &NoopSink).unwrap();

    let content = fs::read_to_string(output.as_std_path()).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["_id"], "HMDBP00001_1");
    assert_eq!(lines[0]["pmid"], "12345");
    assert_eq!(lines[0]["subject"]["uniprot_id"], "P50135");
    assert_eq!(lines[0]["object"]["kegg_id"], "C01092");
    assert_eq!(lines[2]["pmid"], "Unknown");
}

#[test]
fn failed_run_leaves_no_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    fs::copy(
        "tests/fixtures/hmdb_metabolites.xml",
        root.join("hmdb_metabolites.xml").as_std_path(),
    )
    .unwrap();
    fs::write(
        root.join("hmdb_proteins.xml").as_std_path(),
        r#"<hmdb xmlns="http://www.hmdb.ca">
  <protein>
    <accession>HMDBP00001</accession>
    <metabolite_references/>
    <metabolite_associations><metabolite><accession>HMDB0000001</accession></metabolite></metabolite_associations>
  </protein>
  <protein><accession>HMDBP00002</accession></protein>
</hmdb>"#,
    )
    .unwrap();
    let output = root.join("associations.jsonl");
    let config = Config {
        data_folder: Some(root.to_string()),
        ..Config::default()
    };
    let app = App::new(ConfigLoader::resolve_config(config).unwrap());

    let mut sink = AtomicFileSink::create(&output).unwrap();
    let err = app.run(&mut sink, &NoopSink).unwrap_err();
    assert_matches!(err, HmdbError::MissingElement { .. });
    drop(sink);
    assert!(!output.as_std_path().exists());

    let config = Config {
        data_folder: Some(root.to_string()),
        on_malformed: Some(MalformedPolicy::Skip),
        ..Config::default()
    };
    let app = App::new(ConfigLoader::resolve_config(config).unwrap());
    let mut sink = AtomicFileSink::create(&output).unwrap();
    let summary = app.run(&mut sink, &NoopSink).unwrap();
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.skipped_proteins, 1);
    assert!(output.as_std_path().exists());
}

#[test]
fn missing_protein_export_is_reported() {
    let config = Config {
        data_folder: Some("tests/fixtures".to_string()),
        protein_file: Some("absent_proteins.xml".to_string()),
        ..Config::default()
    };
    let app = App::new(ConfigLoader::resolve_config(config).unwrap());
    let mut documents: Vec<AssociationDocument> = Vec::new();
    let err = app.run(&mut documents, &NoopSink).unwrap_err();
    assert_matches!(err, HmdbError::MissingInput(_));
}

#[test]
fn index_summary_counts_cross_references() {
    let app = fixture_app(None);
    let summary = app.index(&NoopSink).unwrap();
    assert_eq!(summary.entries, 4);
    assert_eq!(summary.with_kegg_id, 3);
    assert_eq!(summary.with_chemspider_id, 2);
    assert_eq!(summary.with_chebi_id, 3);
    assert_eq!(summary.with_pubchem_compound_id, 3);
}

#[test]
fn finished_sink_rejects_documents() {
    let dir = tempfile::tempdir().unwrap();
    let output = Utf8PathBuf::from_path_buf(dir.path().join("done.jsonl")).unwrap();
    let mut sink = AtomicFileSink::create(&output).unwrap();
    sink.finish().unwrap();
    assert!(output.as_std_path().exists());

    let app = fixture_app(None);
    let mut documents: Vec<AssociationDocument> = Vec::new();
    app.run(&mut documents, &NoopSink).unwrap();
    let err = sink.accept(&documents[0]).unwrap_err();
    assert_matches!(err, HmdbError::Output(_));
}
