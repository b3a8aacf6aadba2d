//! Persistence for concept models.
//!
//! A saved model is two files:
//! - `<path>`: JSON metadata ([`ModelMetadata`]), cheap to read on its own
//! - `<path>.matrix`: the interpreter matrix, memory-mapped read-only on load
//!
//! Matrix file format:
//! ```text
//! [Header: 32 bytes]
//!   Magic: 4 bytes "CMTX"
//!   Version: 4 bytes (little-endian u32)
//!   Rows: 8 bytes (little-endian u64), number of features
//!   Cols: 8 bytes (little-endian u64), number of concepts
//!   Reserved: 8 bytes
//!
//! [Data: rows * cols * 8 bytes]
//!   Row-major little-endian f64 values
//! ```
//!
//! Both files are written to a temporary sibling and renamed into place, so a
//! model loaded from the same path keeps its mapping of the previous file.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use tempfile::NamedTempFile;

use crate::clustering::ClusteringParams;
use crate::errors::{ConceptError, Result};

const MAGIC: &[u8; 4] = b"CMTX";
pub const MATRIX_FORMAT_VERSION: u32 = 1;
pub const METADATA_VERSION: u32 = 1;
const HEADER_SIZE: usize = 32;
const MATRIX_SUFFIX: &str = ".matrix";

/// What the training run did, kept alongside the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub num_documents: usize,
    pub params: ClusteringParams,
    pub iterations: usize,
    pub converged: bool,
    pub seed: u64,
    pub fallback_medoids: usize,
    pub reinitialised_clusters: usize,
}

/// Lightweight model description stored next to the matrix file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: u32,
    pub num_features: usize,
    pub num_concepts: usize,
    pub concept_titles: Vec<String>,
    pub training: TrainingSummary,
}

impl ModelMetadata {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let meta: ModelMetadata = serde_json::from_reader(std::io::BufReader::new(file))?;
        if meta.version != METADATA_VERSION {
            return Err(ConceptError::UnsupportedVersion(meta.version));
        }
        if meta.concept_titles.len() != meta.num_concepts {
            return Err(ConceptError::TitleMismatch {
                titles: meta.concept_titles.len(),
                documents: meta.num_concepts,
            });
        }
        Ok(meta)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        persist(stage(path, |out| self.write_to(out))?, path)
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut out, self)?;
        Ok(())
    }
}

/// Writes `path`'s future content into a temporary file in the same directory.
///
/// Nothing at `path` is touched until the returned file is [`persist`]ed.
pub fn stage<F>(path: &Path, write: F) -> Result<NamedTempFile>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Renames a staged file over `path`.
pub fn persist(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged.persist(path).map_err(|e| e.error)?;
    debug!("Persisted {}", path.display());
    Ok(())
}

/// Path of the matrix file belonging to the metadata file at `path`.
pub fn matrix_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut s: OsString = path.as_ref().as_os_str().to_owned();
    s.push(MATRIX_SUFFIX);
    PathBuf::from(s)
}

/// Dense `[num_features × num_concepts]` matrix, one column per concept.
#[derive(Debug)]
pub enum InterpreterMatrix {
    InMemory(DenseMatrix<f64>),
    Mapped(MappedMatrix),
}

impl InterpreterMatrix {
    /// `(num_features, num_concepts)`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            InterpreterMatrix::InMemory(m) => m.shape(),
            InterpreterMatrix::Mapped(m) => (m.rows, m.cols),
        }
    }

    /// `M[row, col]`, or `None` outside the matrix.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        match self {
            InterpreterMatrix::InMemory(m) => {
                let (rows, cols) = m.shape();
                (row < rows && col < cols).then(|| *m.get((row, col)))
            }
            InterpreterMatrix::Mapped(m) => m.get(row, col),
        }
    }

    /// `out[c] += weight * M[row, c]` for every concept column `c`.
    ///
    /// A row outside the matrix adds nothing.
    pub fn accumulate_row(&self, row: usize, weight: f64, out: &mut [f64]) {
        let (_, cols) = self.shape();
        for (c, slot) in out.iter_mut().enumerate().take(cols) {
            if let Some(v) = self.get(row, c) {
                *slot += weight * v;
            }
        }
    }

    pub fn is_memory_mapped(&self) -> bool {
        matches!(self, InterpreterMatrix::Mapped(_))
    }

    /// Writes the matrix file at `path`, replacing any existing file by rename.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        persist(stage(path, |out| self.write_to(out))?, path)
    }

    /// Streams the matrix in the row-major file format.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        let (rows, cols) = self.shape();
        debug!("Writing {}x{} interpreter matrix", rows, cols);

        out.write_all(MAGIC)?;
        out.write_all(&MATRIX_FORMAT_VERSION.to_le_bytes())?;
        out.write_all(&(rows as u64).to_le_bytes())?;
        out.write_all(&(cols as u64).to_le_bytes())?;
        out.write_all(&[0u8; 8])?;
        for r in 0..rows {
            for c in 0..cols {
                out.write_all(&self.get(r, c).unwrap_or(0.0).to_le_bytes())?;
            }
        }
        Ok(())
    }

    /// Maps a matrix file read-only. Values are decoded on access.
    pub fn open_mapped<P: AsRef<Path>>(path: P) -> Result<Self> {
        MappedMatrix::open(path).map(InterpreterMatrix::Mapped)
    }
}

/// Read-only memory-mapped interpreter matrix.
#[derive(Debug)]
pub struct MappedMatrix {
    mmap: Mmap,
    rows: usize,
    cols: usize,
}

impl MappedMatrix {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Memory-mapping interpreter matrix {}", path.display());

        let file = File::open(path)?;
        // SAFETY: the mapping is read-only, and saves replace model files by
        // rename instead of writing through an existing file.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < HEADER_SIZE {
            return Err(ConceptError::InvalidMatrixFile(format!(
                "{} bytes, shorter than header",
                mmap.len()
            )));
        }
        if &mmap[0..4] != MAGIC {
            return Err(ConceptError::InvalidMatrixFile("bad magic".into()));
        }

        let version = read_u32(&mmap[4..8]);
        if version != MATRIX_FORMAT_VERSION {
            return Err(ConceptError::UnsupportedVersion(version));
        }

        let rows = read_u64(&mmap[8..16]) as usize;
        let cols = read_u64(&mmap[16..24]) as usize;
        let expected = rows
            .checked_mul(cols)
            .and_then(|cells| cells.checked_mul(8))
            .and_then(|bytes| bytes.checked_add(HEADER_SIZE))
            .ok_or_else(|| {
                ConceptError::InvalidMatrixFile(format!("shape {}x{} overflows", rows, cols))
            })?;
        if mmap.len() != expected {
            return Err(ConceptError::InvalidMatrixFile(format!(
                "expected {} bytes for {}x{}, found {}",
                expected,
                rows,
                cols,
                mmap.len()
            )));
        }

        Ok(Self { mmap, rows, cols })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let offset = HEADER_SIZE + (row * self.cols + col) * 8;
        let bytes = self.mmap.get(offset..offset + 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Some(f64::from_le_bytes(buf))
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
