use anyhow::{bail, Result};
use std::io::BufRead;

use super::fasta::split_header;

#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

/// 四行一组的 FASTQ 解析器（不支持折行序列）。
pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false }
    }

    fn next_line(&mut self) -> Result<bool> {
        self.buf.clear();
        Ok(self.reader.read_line(&mut self.buf)? > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        if self.done {
            return Ok(None);
        }
        if !self.next_line()? {
            self.done = true;
            return Ok(None);
        }
        let Some(header) = self.buf.strip_prefix('@') else {
            bail!("FASTQ header not starting with '@': {:?}", self.buf.trim_end());
        };
        let (id, desc) = split_header(header.trim_end());

        if !self.next_line()? {
            bail!("unexpected EOF after header of read '{}'", id);
        }
        let seq = self.buf.trim_end().as_bytes().to_vec();

        if !self.next_line()? || !self.buf.starts_with('+') {
            bail!("missing '+' line for read '{}'", id);
        }
        if !self.next_line()? {
            bail!("missing quality line for read '{}'", id);
        }
        let qual = self.buf.trim_end().as_bytes().to_vec();
        if qual.len() != seq.len() {
            bail!(
                "read '{}': sequence is {} bp but quality string is {} chars",
                id,
                seq.len(),
                qual.len()
            );
        }
        Ok(Some(FastqRecord { id, desc, seq, qual }))
    }
}
