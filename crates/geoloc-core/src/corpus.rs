//! Input parsing: labeled records, bare feature lines, stopword lists, and
//! the vocabulary index used to filter model loading.
//!
//! One record per line, comma-separated with additional whitespace accepted
//! as a separator. Training corpora may be gzip-compressed; the reader
//! sniffs the two magic bytes and decompresses transparently.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{GeolocError, Result};

/// One labeled document: origin coordinates plus its feature tokens.
#[derive(Debug, Clone)]
pub struct Record {
    pub lat: f64,
    pub lon: f64,
    pub tokens: Vec<String>,
}

/// Split a line into fields on commas and whitespace, dropping empties.
pub fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty())
}

/// Parse a labeled record line: `lat, lon, tok1, ..., tokN`. A non-numeric
/// coordinate field is fatal; callers that want lenient parsing must filter
/// upstream.
pub fn parse_record(line: &str, line_number: usize) -> Result<Record> {
    let mut fields = tokenize(line);
    let lat = parse_coord(fields.next(), "latitude", line_number)?;
    let lon = parse_coord(fields.next(), "longitude", line_number)?;
    let tokens = fields.map(str::to_owned).collect();
    Ok(Record { lat, lon, tokens })
}

fn parse_coord(field: Option<&str>, which: &str, line_number: usize) -> Result<f64> {
    let field = field.ok_or_else(|| GeolocError::CorpusParse {
        line: line_number,
        reason: format!("missing {which} field"),
    })?;
    field.parse().map_err(|_| GeolocError::CorpusParse {
        line: line_number,
        reason: format!("malformed {which} '{field}'"),
    })
}

/// Read a labeled corpus from a plain-text file.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).map_err(|e| GeolocError::io(path, e))?;
    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| GeolocError::io(path, e))?;
        records.push(parse_record(&line, i + 1)?);
    }
    Ok(records)
}

/// Read a stopword list: one token per line, empty lines ignored.
pub fn read_stopwords(path: &Path) -> Result<HashSet<String>> {
    eprintln!("Reading stopwords from '{}'...", path.display());
    let file = File::open(path).map_err(|e| GeolocError::io(path, e))?;
    let mut stopwords = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| GeolocError::io(path, e))?;
        let word = line.trim();
        if !word.is_empty() {
            stopwords.insert(word.to_owned());
        }
    }
    Ok(stopwords)
}

/// Collect every distinct field in the file, coordinates included. Used to
/// tell the model reader which features a test set can possibly need.
pub fn index_vocabulary(path: &Path) -> Result<HashSet<String>> {
    let file = File::open(path).map_err(|e| GeolocError::io(path, e))?;
    let mut vocabulary = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| GeolocError::io(path, e))?;
        for token in tokenize(&line) {
            if !vocabulary.contains(token) {
                vocabulary.insert(token.to_owned());
            }
        }
    }
    Ok(vocabulary)
}

/// Open a file for buffered reading, decompressing gzip content when the
/// magic bytes say so.
pub fn open_maybe_gzip(path: &Path) -> Result<Box<dyn BufRead>> {
    let mut file = File::open(path).map_err(|e| GeolocError::io(path, e))?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic).map_err(|e| GeolocError::io(path, e))?;
    let file = File::open(path).map_err(|e| GeolocError::io(path, e))?;
    if n == 2 && magic == [0x1f, 0x8b] {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
