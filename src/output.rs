use std::fs;
use std::io::{self, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::app::{IndexSummary, RunSummary};
use crate::domain::AssociationDocument;
use crate::error::HmdbError;

/// Consumer of emitted documents, e.g. a bulk loader or a file writer.
pub trait DocumentSink {
    fn accept(&mut self, document: &AssociationDocument) -> Result<(), HmdbError>;

    fn finish(&mut self) -> Result<(), HmdbError> {
        Ok(())
    }
}

impl DocumentSink for Vec<AssociationDocument> {
    fn accept(&mut self, document: &AssociationDocument) -> Result<(), HmdbError> {
        self.push(document.clone());
        Ok(())
    }
}

/// Writes one JSON document per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DocumentSink for JsonLinesSink<W> {
    fn accept(&mut self, document: &AssociationDocument) -> Result<(), HmdbError> {
        serde_json::to_writer(&mut self.writer, document)
            .map_err(|err| HmdbError::Output(err.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|err| HmdbError::Output(err.to_string()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), HmdbError> {
        self.writer
            .flush()
            .map_err(|err| HmdbError::Output(err.to_string()))
    }
}

/// JSON-lines file that only appears at its destination once `finish`
/// succeeds. An unfinished sink leaves the destination untouched.
pub struct AtomicFileSink {
    destination: Utf8PathBuf,
    lines: Option<JsonLinesSink<BufWriter<NamedTempFile>>>,
}

impl AtomicFileSink {
    pub fn create(destination: &Utf8Path) -> Result<Self, HmdbError> {
        let parent = match destination.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| HmdbError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("hmdb-assoc")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HmdbError::Filesystem(err.to_string()))?;
        Ok(Self {
            destination: destination.to_path_buf(),
            lines: Some(JsonLinesSink::new(BufWriter::new(temp))),
        })
    }

    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }
}

impl DocumentSink for AtomicFileSink {
    fn accept(&mut self, document: &AssociationDocument) -> Result<(), HmdbError> {
        match self.lines.as_mut() {
            Some(lines) => lines.accept(document),
            None => Err(HmdbError::Output(format!(
                "{} is already finished",
                self.destination
            ))),
        }
    }

    fn finish(&mut self) -> Result<(), HmdbError> {
        let Some(lines) = self.lines.take() else {
            return Ok(());
        };
        let temp = lines
            .into_inner()
            .into_inner()
            .map_err(|err| HmdbError::Output(err.error().to_string()))?;
        temp.persist(self.destination.as_std_path())
            .map_err(|err| HmdbError::Output(err.to_string()))?;
        Ok(())
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_index(result: &IndexSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
