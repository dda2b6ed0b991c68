use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use popguard_core::ipc::decode_line;

pub trait EventSource<T> {
    fn next_event(&mut self) -> Result<Option<T>>;
}

/// Reads one JSON value per line. Blank lines and `#` comments are skipped.
pub struct JsonlSource<R, T> {
    reader: R,
    line_number: usize,
    _marker: PhantomData<T>,
}

impl<T> JsonlSource<BufReader<File>, T> {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open event script {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead, T> JsonlSource<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            _marker: PhantomData,
        }
    }
}

impl<R: BufRead, T: DeserializeOwned> EventSource<T> for JsonlSource<R, T> {
    fn next_event(&mut self) -> Result<Option<T>> {
        loop {
            let mut line = String::new();
            let bytes = self.reader.read_line(&mut line)?;
            if bytes == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let event = decode_line(trimmed)
                .with_context(|| format!("line {}", self.line_number))?;
            return Ok(Some(event));
        }
    }
}
