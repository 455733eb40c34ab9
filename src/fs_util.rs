use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;
use zip::ZipArchive;

use crate::error::HmdbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Xml,
    Gzip,
    Zip,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("gz") => SourceKind::Gzip,
            Some("zip") => SourceKind::Zip,
            _ => SourceKind::Xml,
        }
    }
}

/// Opens an HMDB export as buffered XML. Plain files, gzip streams and the
/// `.zip` archives HMDB distributes are all accepted.
pub fn open_xml_source(path: &Path) -> Result<Box<dyn BufRead>, HmdbError> {
    if !path.exists() {
        return Err(HmdbError::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path)
        .map_err(|err| HmdbError::Filesystem(format!("open {}: {err}", path.display())))?;

    match SourceKind::from_path(path) {
        SourceKind::Xml => Ok(Box::new(BufReader::new(file))),
        SourceKind::Gzip => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        SourceKind::Zip => {
            let spooled = spool_zip_entry(file, path)?;
            Ok(Box::new(BufReader::new(spooled)))
        }
    }
}

// Zip entries borrow their archive, so the XML entry is copied to an
// anonymous temp file that the returned reader can own.
fn spool_zip_entry(file: File, path: &Path) -> Result<File, HmdbError> {
    let mut archive = ZipArchive::new(file)
        .map_err(|err| HmdbError::Archive(format!("open {}: {err}", path.display())))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| HmdbError::Archive(err.to_string()))?;
        if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".xml") {
            continue;
        }
        let mut spool = tempfile::tempfile().map_err(|err| HmdbError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut spool).map_err(|err| HmdbError::Archive(err.to_string()))?;
        spool
            .seek(SeekFrom::Start(0))
            .map_err(|err| HmdbError::Filesystem(err.to_string()))?;
        debug!(archive = %path.display(), entry = entry.name(), "spooled zip entry");
        return Ok(spool);
    }

    Err(HmdbError::Archive(format!(
        "{} contains no .xml entry",
        path.display()
    )))
}
