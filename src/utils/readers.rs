use super::Result;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read as ioRead};
use std::path::Path;

pub fn open_fasta_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    fn is_gzipped(path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        path_str.ends_with(".gz") || path_str.ends_with(".gzip")
    }
    let file = File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(format!("Invalid gzip header: {}", path.to_string_lossy()))
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    pub name: String,
    pub seq: String,
}

/// Lazy reader over FASTA (multi-line bodies) and 4-line FASTQ records.
/// Record names are the first whitespace-delimited token of the header;
/// end-of-stream is iterator exhaustion.
pub struct FastaReader<R: BufRead> {
    reader: R,
    pending_header: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        FastaReader {
            reader,
            pending_header: None,
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let num_read = self.reader.read_line(&mut line).map_err(|e| e.to_string())?;
        if num_read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end().to_string()))
    }

    fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.pending_header.take() {
            Some(header) => Some(header),
            None => loop {
                match self.read_line()? {
                    None => break None,
                    Some(line) if line.is_empty() => continue,
                    Some(line) => break Some(line),
                }
            },
        };
        let Some(header) = header else {
            return Ok(None);
        };

        if let Some(rest) = header.strip_prefix('>') {
            let name = parse_name(rest)?;
            let mut seq = String::new();
            loop {
                match self.read_line()? {
                    None => break,
                    Some(line) if line.starts_with('>') || line.starts_with('@') => {
                        self.pending_header = Some(line);
                        break;
                    }
                    Some(line) => seq.push_str(line.trim()),
                }
            }
            Ok(Some(FastaRecord { name, seq }))
        } else if let Some(rest) = header.strip_prefix('@') {
            let name = parse_name(rest)?;
            let seq = self
                .read_line()?
                .ok_or_else(|| format!("Truncated FASTQ record: {}", name))?;
            let separator = self
                .read_line()?
                .ok_or_else(|| format!("Truncated FASTQ record: {}", name))?;
            if !separator.starts_with('+') {
                return Err(format!(
                    "Malformed FASTQ separator for record {}: {}",
                    name, separator
                ));
            }
            self.read_line()?
                .ok_or_else(|| format!("Truncated FASTQ record: {}", name))?;
            Ok(Some(FastaRecord {
                name,
                seq: seq.trim().to_string(),
            }))
        } else {
            Err(format!("Expected FASTA/FASTQ header, got: {}", header))
        }
    }
}

fn parse_name(header: &str) -> Result<String> {
    match header.split_whitespace().next() {
        Some(name) => Ok(name.to_string()),
        None => Err("Empty sequence header".to_string()),
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
