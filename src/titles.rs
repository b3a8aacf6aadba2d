//! Concept labels, one per concept document, index-aligned with corpus order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Ordered list of document titles.
///
/// The source file holds one UTF-8 title per line; line `i` names document `i`
/// of the training corpus.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTitles {
    titles: Vec<String>,
}

impl DocumentTitles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads titles from a text file, one per line. Trailing `\r\n`/`\n` are
    /// stripped; surrounding whitespace is kept.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading concept titles from {}", path.display());

        let reader = BufReader::new(File::open(path)?);
        let mut titles = Vec::new();
        for line in reader.lines() {
            titles.push(line?);
        }

        info!("Loaded {} concept titles", titles.len());
        Ok(Self { titles })
    }

    /// Writes titles back one per line.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for title in &self.titles {
            writeln!(out, "{}", title)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn push<S: Into<String>>(&mut self, title: S) {
        self.titles.push(title.into());
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.titles.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.titles.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.titles
    }
}

impl std::ops::Index<usize> for DocumentTitles {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.titles[index]
    }
}

impl<S: Into<String>> FromIterator<S> for DocumentTitles {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            titles: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Vec<String>> for DocumentTitles {
    fn from(titles: Vec<String>) -> Self {
        Self { titles }
    }
}
