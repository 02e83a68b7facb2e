//! Model file codec: section-tagged text, gzip-compressed end-to-end.
//!
//! ```text
//! #LONGRANULARITY# <L>
//! #TWEETMATRIX#
//! <x> <y> <value>          (sparse prior, repeated)
//! #END#
//! #CENTROIDS#
//! <lat> <lon>              (one row per cell, in cell order)
//! #END#
//! #WORD# <index> <name> [<weight>]
//! <lat> <lon>              (observation rows)
//! #MATRIX#                 (present iff densities are stored)
//! <x> <y> <value>
//! #END#                    (per feature)
//! #END#                    (feature list terminator)
//! #WORDMATRIX#
//! <x> <y> <value>
//! #END#
//! ```
//!
//! Values are written from f32 and re-read as f64; the representation loss
//! is accepted. Any malformed content is fatal.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::centroids::Centroids;
use crate::config::Config;
use crate::error::{GeolocError, Result};
use crate::features::{FeatureRecord, FeatureStore};
use crate::grid::Grid;
use crate::matrix::DenseMatrix;
use crate::sparse::SparseMatrix;

/// A complete loaded (or freshly trained) model. Read-only at
/// classification time except for the tune pass, which adjusts weights.
#[derive(Debug)]
pub struct Model {
    pub config: Config,
    pub grid: Grid,
    /// Normalized document-origin prior over cells.
    pub prior: DenseMatrix,
    /// Unnormalized sum of all retained per-feature densities.
    pub feature_mass: DenseMatrix,
    pub centroids: Centroids,
    pub features: FeatureStore,
    /// Number of feature sections in the model file, including any the
    /// load filter skipped.
    pub word_types: usize,
}

impl Model {
    /// Number of observation points across the materialized features.
    pub fn total_tokens(&self) -> u64 {
        self.features.total_points()
    }
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Streaming writer. The trainer drives it section by section so per-feature
/// matrices never have to be held in memory together.
pub struct ModelWriter {
    out: GzEncoder<BufWriter<File>>,
    path: PathBuf,
}

impl ModelWriter {
    pub fn create(path: &Path, grid: &Grid) -> Result<Self> {
        let file = File::create(path).map_err(|e| GeolocError::io(path, e))?;
        let mut writer = Self {
            out: GzEncoder::new(BufWriter::new(file), Compression::default()),
            path: path.to_owned(),
        };
        writer.put(format_args!("#LONGRANULARITY# {}\n", grid.lon_ticks()))?;
        Ok(writer)
    }

    /// The normalized document-origin prior, in sparse form.
    pub fn write_prior(&mut self, prior: &SparseMatrix) -> Result<()> {
        self.sparse_section("#TWEETMATRIX#", prior)
    }

    pub fn write_centroids(&mut self, centroids: &Centroids) -> Result<()> {
        self.put(format_args!("#CENTROIDS#\n"))?;
        for (lat, lon) in centroids.iter() {
            self.put(format_args!("{lat} {lon}\n"))?;
        }
        self.put(format_args!("#END#\n"))
    }

    /// One feature section: header, observation rows, optional density.
    /// The trainer omits the weight field (everything is 1.0 at train
    /// time); the post-tune writer includes it.
    pub fn write_feature(
        &mut self,
        index: usize,
        record: &FeatureRecord,
        density: Option<&SparseMatrix>,
        with_weight: bool,
    ) -> Result<()> {
        if with_weight {
            self.put(format_args!("#WORD# {} {} {:.6}\n", index, record.name, record.weight))?;
        } else {
            self.put(format_args!("#WORD# {} {}\n", index, record.name))?;
        }
        for p in &record.points {
            self.put(format_args!("{} {}\n", p.lat, p.lon))?;
        }
        if let Some(density) = density {
            self.put(format_args!("#MATRIX#\n"))?;
            self.triples(density)?;
        }
        self.put(format_args!("#END#\n"))
    }

    /// Terminates the feature list.
    pub fn finish_features(&mut self) -> Result<()> {
        self.put(format_args!("#END#\n"))
    }

    /// The unnormalized aggregate feature-mass matrix, in sparse form.
    pub fn write_feature_mass(&mut self, mass: &SparseMatrix) -> Result<()> {
        self.sparse_section("#WORDMATRIX#", mass)
    }

    pub fn finish(self) -> Result<()> {
        let path = self.path;
        self.out
            .finish()
            .and_then(|mut inner| inner.flush())
            .map_err(|e| GeolocError::io(&path, e))
    }

    fn sparse_section(&mut self, tag: &str, matrix: &SparseMatrix) -> Result<()> {
        self.put(format_args!("{tag}\n"))?;
        self.triples(matrix)?;
        self.put(format_args!("#END#\n"))
    }

    fn triples(&mut self, matrix: &SparseMatrix) -> Result<()> {
        for e in &matrix.entries {
            self.put(format_args!("{} {} {}\n", e.x, e.y, e.value))?;
        }
        Ok(())
    }

    fn put(&mut self, args: std::fmt::Arguments<'_>) -> Result<()> {
        self.out.write_fmt(args).map_err(|e| GeolocError::io(&self.path, e))
    }
}

/// Write a complete in-memory model, weights included. Used after tuning;
/// the trainer streams its output instead.
pub fn write_model(path: &Path, model: &Model) -> Result<()> {
    eprintln!("Writing p(c) matrix");
    let mut writer = ModelWriter::create(path, &model.grid)?;
    writer.write_prior(&SparseMatrix::from_dense(&model.prior))?;
    writer.write_centroids(&model.centroids)?;
    for (index, record) in model.features.records().iter().enumerate() {
        if record.points.len() < model.config.threshold {
            continue;
        }
        writer.write_feature(index, record, record.density.as_ref(), true)?;
    }
    writer.finish_features()?;
    eprintln!("Writing (unnormalized) p(c)_w matrix...");
    writer.write_feature_mass(&SparseMatrix::from_dense(&model.feature_mass))?;
    writer.finish()
}

// ── Reading ───────────────────────────────────────────────────────────────────

struct ModelLines {
    lines: Lines<BufReader<MultiGzDecoder<File>>>,
    path: PathBuf,
}

impl ModelLines {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| GeolocError::io(path, e))?;
        Ok(Self {
            lines: BufReader::new(MultiGzDecoder::new(file)).lines(),
            path: path.to_owned(),
        })
    }

    /// Next line; running out of input mid-model is a parse error.
    fn need(&mut self) -> Result<String> {
        match self.lines.next() {
            Some(Ok(line)) => Ok(line),
            Some(Err(e)) => Err(GeolocError::io(&self.path, e)),
            None => Err(GeolocError::ModelParse),
        }
    }

    fn expect(&mut self, tag: &str) -> Result<()> {
        if self.need()?.starts_with(tag) {
            Ok(())
        } else {
            Err(GeolocError::ModelParse)
        }
    }
}

fn parse_triple(line: &str, grid: &Grid) -> Result<(usize, usize, f64)> {
    let mut fields = line.split_whitespace();
    let x: usize = next_field(&mut fields)?;
    let y: usize = next_field(&mut fields)?;
    let value: f64 = next_field(&mut fields)?;
    if x >= grid.lon_ticks() || y >= grid.lat_ticks() {
        return Err(GeolocError::ModelParse);
    }
    Ok((x, y, value))
}

fn parse_pair(line: &str) -> Result<(f64, f64)> {
    let mut fields = line.split_whitespace();
    let a = next_field(&mut fields)?;
    let b = next_field(&mut fields)?;
    Ok((a, b))
}

fn next_field<T: std::str::FromStr>(fields: &mut std::str::SplitWhitespace<'_>) -> Result<T> {
    fields.next().and_then(|f| f.parse().ok()).ok_or(GeolocError::ModelParse)
}

/// Read a model file. When `filter` is given, only features whose name it
/// contains are materialized; the rest of the file is still consumed so the
/// word-type total and everything after the feature list stay correct.
/// The granularity in the model header overrides the one in `config`.
pub fn read_model(path: &Path, filter: Option<&HashSet<String>>, config: &Config) -> Result<Model> {
    eprintln!("Reading model from {}...", path.display());
    let mut input = ModelLines::open(path)?;

    let header = input.need()?;
    let longranularity: usize = header
        .strip_prefix("#LONGRANULARITY#")
        .and_then(|rest| rest.trim().parse().ok())
        .ok_or(GeolocError::ModelParse)?;
    let config = config.with_longranularity(longranularity);
    let grid = config.grid().map_err(|_| GeolocError::ModelParse)?;
    eprintln!(
        "Stored model has {}/{} granularity; grid size = {}° x {}°",
        grid.lon_ticks(),
        grid.lat_ticks(),
        grid.delta(),
        grid.delta()
    );

    input.expect("#TWEETMATRIX#")?;
    let prior = read_sparse_dense(&mut input, &grid)?;

    input.expect("#CENTROIDS#")?;
    let mut table = Vec::with_capacity(grid.cells());
    loop {
        let line = input.need()?;
        if line.starts_with('#') {
            if !line.starts_with("#END#") {
                return Err(GeolocError::ModelParse);
            }
            break;
        }
        if table.len() == grid.cells() {
            return Err(GeolocError::ModelParse);
        }
        table.push(parse_pair(&line)?);
    }
    if table.len() != grid.cells() {
        return Err(GeolocError::ModelParse);
    }
    let centroids = Centroids::from_table(table);

    let mut features = FeatureStore::new();
    let mut word_types = 0usize;
    loop {
        let line = input.need()?;
        if line.starts_with("#END#") {
            break;
        }
        let mut fields = line.split_whitespace();
        if fields.next() != Some("#WORD#") {
            return Err(GeolocError::ModelParse);
        }
        let _index: usize = next_field(&mut fields)?;
        let name = fields.next().ok_or(GeolocError::ModelParse)?.to_owned();
        let weight: f64 = match fields.next() {
            Some(w) => w.parse().map_err(|_| GeolocError::ModelParse)?,
            None => 1.0,
        };
        word_types += 1;

        if filter.is_some_and(|wanted| !wanted.contains(&name)) {
            // Not needed; consume the section without materializing it.
            loop {
                if input.need()?.starts_with("#END#") {
                    break;
                }
            }
            continue;
        }

        features.add(&name, 0.0, 0.0);
        features.set_weight(&name, weight)?;
        let mut has_matrix = false;
        loop {
            let line = input.need()?;
            if line.starts_with("#MATRIX#") {
                has_matrix = true;
                break;
            }
            if line.starts_with("#END#") {
                break;
            }
            let (lat, lon) = parse_pair(&line)?;
            features.add(&name, lat, lon);
        }
        if has_matrix {
            let mut density = SparseMatrix::new();
            loop {
                let line = input.need()?;
                if line.starts_with("#END#") {
                    break;
                }
                let (x, y, value) = parse_triple(&line, &grid)?;
                density.push(x as i16, y as i16, value as f32);
            }
            features.attach_density(&name, density)?;
        }
    }

    input.expect("#WORDMATRIX#")?;
    let feature_mass = read_sparse_dense(&mut input, &grid)?;

    eprintln!("Done...");
    eprintln!("Number of word types in model: {word_types}");
    eprintln!("Number of word tokens in model: {}", features.total_points());

    Ok(Model { config, grid, prior, feature_mass, centroids, features, word_types })
}

fn read_sparse_dense(input: &mut ModelLines, grid: &Grid) -> Result<DenseMatrix> {
    let mut matrix = DenseMatrix::zeros(grid);
    loop {
        let line = input.need()?;
        if line.starts_with('#') {
            if !line.starts_with("#END#") {
                return Err(GeolocError::ModelParse);
            }
            return Ok(matrix);
        }
        let (x, y, value) = parse_triple(&line, grid)?;
        matrix.data[x + y * grid.lon_ticks()] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_model(name: &str, body: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("geoloc-{}-{}.gz", name, std::process::id()));
        let file = File::create(&path).unwrap();
        let mut enc = GzEncoder::new(file, Compression::default());
        enc.write_all(body.as_bytes()).unwrap();
        enc.finish().unwrap();
        path
    }

    fn tiny_model_text() -> String {
        let grid = Grid::new(4).unwrap(); // 4 x 2 cells
        let mut body = String::from("#LONGRANULARITY# 4\n#TWEETMATRIX#\n");
        body.push_str("0 0 0.5\n1 1 0.5\n#END#\n#CENTROIDS#\n");
        for cell in 0..grid.cells() {
            let (lat, lon) = grid.cell_midpoint(cell);
            body.push_str(&format!("{lat} {lon}\n"));
        }
        body.push_str("#END#\n");
        body.push_str("#WORD# 0 alpha\n40 -74\n41 -73\n#MATRIX#\n1 1 2\n#END#\n");
        body.push_str("#WORD# 1 beta 0.250000\n-10 30\n#END#\n");
        body.push_str("#END#\n#WORDMATRIX#\n1 1 2\n2 0 1\n#END#\n");
        body
    }

    #[test]
    fn reads_every_section() {
        let path = temp_model("full", &tiny_model_text());
        let model = read_model(&path, None, &Config::default()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(model.grid.lon_ticks(), 4);
        assert_eq!(model.word_types, 2);
        assert_eq!(model.total_tokens(), 3);
        assert_eq!(model.prior.get(0, 0), 0.5);
        assert_eq!(model.prior.get(1, 1), 0.5);
        assert_eq!(model.feature_mass.get(2, 0), 1.0);
        assert_eq!(model.centroids.len(), model.grid.cells());

        let alpha = model.features.record(model.features.find("alpha").unwrap());
        assert_eq!(alpha.points.len(), 2);
        assert_eq!(alpha.weight, 1.0, "absent weight defaults to 1.0");
        assert!(alpha.density.is_some());

        let beta = model.features.record(model.features.find("beta").unwrap());
        assert_eq!(beta.weight, 0.25);
        assert!(beta.density.is_none());
    }

    #[test]
    fn filter_skips_but_still_counts() {
        let path = temp_model("filtered", &tiny_model_text());
        let mut wanted = HashSet::new();
        wanted.insert("beta".to_owned());
        let model = read_model(&path, Some(&wanted), &Config::default()).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(model.features.find("alpha").is_none());
        assert!(model.features.find("beta").is_some());
        assert_eq!(model.word_types, 2, "skipped features still count as word types");
        assert_eq!(model.total_tokens(), 1, "skipped features contribute no tokens");
        assert_eq!(model.feature_mass.get(1, 1), 2.0, "sections after the skip still load");
    }

    #[test]
    fn garbage_is_fatal() {
        let path = temp_model("garbage", "#LONGRANULARITY# 4\n#TWEETMATRIX#\nnot a triple\n");
        let err = read_model(&path, None, &Config::default()).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, GeolocError::ModelParse));
        assert_eq!(err.to_string(), "File error reading model");
    }

    #[test]
    fn truncated_file_is_fatal() {
        let path = temp_model("truncated", "#LONGRANULARITY# 4\n#TWEETMATRIX#\n0 0 0.5\n");
        let err = read_model(&path, None, &Config::default()).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, GeolocError::ModelParse));
    }

    #[test]
    fn header_granularity_overrides_config() {
        let path = temp_model("override", &tiny_model_text());
        let config = Config { longranularity: 360, ..Config::default() };
        let model = read_model(&path, None, &config).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(model.config.longranularity, 4);
    }
}
