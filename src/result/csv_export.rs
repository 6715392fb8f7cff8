//! CSV serialization of result sets.
//!
//! Rows are pushed through a `csv::Writer` into an incremental encoder, so a
//! large result streams to disk in bounded memory.

use crate::db::{Row, Value};
use crate::error::{CellError, Result};
use csv::ByteRecord;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Target text encoding of a CSV file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CsvEncoding {
    #[default]
    Utf8,
    /// UTF-8 preceded by a byte order mark.
    Utf8Sig,
    Latin1,
}

impl FromStr for CsvEncoding {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-8-sig" | "utf8-sig" => Ok(Self::Utf8Sig),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(CellError::usage(format!(
                "unknown encoding '{other}' (expected utf-8, utf-8-sig or latin-1)"
            ))),
        }
    }
}

/// Options for CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub encoding: CsvEncoding,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: CsvEncoding::Utf8,
        }
    }
}

/// Feedback returned after writing a CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvResultDescriptor {
    pub path: PathBuf,
}

impl fmt::Display for CsvResultDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let absolute = std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone());
        write!(f, "CSV results at {}", absolute.display())
    }
}

/// Re-encodes UTF-8 bytes into the target encoding as they are written.
///
/// A multi-byte sequence split across two writes is held back until it is complete.
struct EncodingWriter<W: Write> {
    inner: W,
    encoding: CsvEncoding,
    pending: Vec<u8>,
}

impl<W: Write> EncodingWriter<W> {
    fn new(mut inner: W, encoding: CsvEncoding) -> io::Result<Self> {
        if encoding == CsvEncoding::Utf8Sig {
            inner.write_all(UTF8_BOM)?;
        }
        Ok(Self {
            inner,
            encoding,
            pending: Vec::new(),
        })
    }

    fn encode_latin1(&mut self) -> io::Result<()> {
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        };

        let text = String::from_utf8_lossy(&self.pending[..valid_up_to]).into_owned();
        let mut encoded = Vec::with_capacity(text.len());
        for c in text.chars() {
            let code = u32::from(c);
            if code > 0xFF {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("character '{c}' cannot be encoded as latin-1"),
                ));
            }
            encoded.push(code as u8);
        }

        self.inner.write_all(&encoded)?;
        self.pending.drain(..valid_up_to);
        Ok(())
    }

    fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "incomplete UTF-8 sequence at end of output",
            ));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.encoding {
            CsvEncoding::Utf8 | CsvEncoding::Utf8Sig => self.inner.write_all(buf)?,
            CsvEncoding::Latin1 => {
                self.pending.extend_from_slice(buf);
                self.encode_latin1()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes a header and rows as CSV into `out`, returning the underlying writer.
pub(crate) fn write_records<'a, W, I>(
    out: W,
    header: &[String],
    rows: I,
    options: &CsvOptions,
) -> io::Result<W>
where
    W: Write,
    I: IntoIterator<Item = &'a Row>,
{
    let encoder = EncodingWriter::new(out, options.encoding)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .terminator(csv::Terminator::CRLF)
        .from_writer(encoder);

    let mut record = ByteRecord::with_capacity(256, header.len());
    for name in header {
        record.push_field(name.as_bytes());
    }
    writer.write_byte_record(&record)?;

    for row in rows {
        record.clear();
        for value in row {
            match value {
                Value::Null => record.push_field(b""),
                other => record.push_field(other.to_display_string().as_bytes()),
            }
        }
        writer.write_byte_record(&record)?;
    }

    let encoder = writer
        .into_inner()
        .map_err(|e| io::Error::new(e.error().kind(), e.error().to_string()))?;
    encoder.finish()
}

/// Writes CSV to a string. The encoding option is ignored: the text is always UTF-8.
pub(crate) fn to_string<'a, I>(header: &[String], rows: I, delimiter: u8) -> Result<String>
where
    I: IntoIterator<Item = &'a Row>,
{
    let options = CsvOptions {
        delimiter,
        encoding: CsvEncoding::Utf8,
    };
    let bytes = write_records(Vec::new(), header, rows, &options)?;
    String::from_utf8(bytes).map_err(|e| CellError::internal(e.to_string()))
}

/// Writes CSV to `path`, streaming through a buffered file writer.
pub(crate) fn to_file<'a, I>(
    path: &Path,
    header: &[String],
    rows: I,
    options: &CsvOptions,
) -> Result<CsvResultDescriptor>
where
    I: IntoIterator<Item = &'a Row>,
{
    let file = File::create(path)
        .map_err(|e| CellError::io(format!("Cannot create {}: {e}", path.display())))?;
    let out = write_records(BufWriter::new(file), header, rows, options)
        .map_err(|e| CellError::io(format!("Cannot write {}: {e}", path.display())))?;
    drop(out);

    Ok(CsvResultDescriptor {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header() -> Vec<String> {
        vec!["name".to_string(), "note".to_string()]
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("UTF-8".parse::<CsvEncoding>().unwrap(), CsvEncoding::Utf8);
        assert_eq!("utf_8_sig".parse::<CsvEncoding>().unwrap(), CsvEncoding::Utf8Sig);
        assert_eq!("latin1".parse::<CsvEncoding>().unwrap(), CsvEncoding::Latin1);
        assert!("ebcdic".parse::<CsvEncoding>().is_err());
    }

    #[test]
    fn test_quotes_and_nulls() {
        let rows = vec![
            vec![Value::from("a,b"), Value::Null],
            vec![Value::from("say \"hi\""), Value::Int(3)],
        ];
        let text = to_string(&header(), &rows, b',').unwrap();
        assert_eq!(text, "name,note\r\n\"a,b\",\r\n\"say \"\"hi\"\"\",3\r\n");
    }

    #[test]
    fn test_custom_delimiter() {
        let rows = vec![vec![Value::from("x"), Value::Int(1)]];
        let text = to_string(&header(), &rows, b';').unwrap();
        assert_eq!(text, "name;note\r\nx;1\r\n");
    }

    #[test]
    fn test_utf8_sig_writes_bom() {
        let options = CsvOptions {
            encoding: CsvEncoding::Utf8Sig,
            ..CsvOptions::default()
        };
        let bytes = write_records(Vec::new(), &header(), &Vec::new(), &options).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(&bytes[3..], b"name,note\r\n");
    }

    #[test]
    fn test_latin1_reencodes() {
        let options = CsvOptions {
            encoding: CsvEncoding::Latin1,
            ..CsvOptions::default()
        };
        let rows = vec![vec![Value::from("café"), Value::Null]];
        let bytes = write_records(Vec::new(), &header(), &rows, &options).unwrap();
        assert_eq!(bytes, b"name,note\r\ncaf\xE9,\r\n".to_vec());
    }

    #[test]
    fn test_latin1_rejects_unencodable() {
        let options = CsvOptions {
            encoding: CsvEncoding::Latin1,
            ..CsvOptions::default()
        };
        let rows = vec![vec![Value::from("日本"), Value::Null]];
        assert!(write_records(Vec::new(), &header(), &rows, &options).is_err());
    }

    #[test]
    fn test_split_multibyte_sequence() {
        let mut writer = EncodingWriter::new(Vec::new(), CsvEncoding::Latin1).unwrap();
        let bytes = "é".as_bytes();
        writer.write_all(&bytes[..1]).unwrap();
        writer.write_all(&bytes[1..]).unwrap();
        assert_eq!(writer.finish().unwrap(), vec![0xE9]);
    }

    #[test]
    fn test_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![vec![Value::from("x"), Value::Int(1)]];
        let descriptor = to_file(&path, &header(), &rows, &CsvOptions::default()).unwrap();

        assert_eq!(descriptor.path, path);
        assert!(descriptor.to_string().starts_with("CSV results at "));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "name,note\r\nx,1\r\n"
        );
    }
}
