//! Delta records and their private byte stream
//!
//! The sweep writes one record per vertical boundary piece; reconstruction
//! reads them back in the same order. The stream is framed as
//!
//! ```text
//! "DMRG" version:u16
//! { tag:u8 x0:i32 x1:i32 y0:i32 y1:i32 }*
//! 0:u8 record_count:u64
//! ```
//!
//! all little-endian. The trailer lets the reader tell a finished stream from
//! a truncated one. The layout is internal and may change with the version.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};

use anyhow::Context;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const MAGIC: &[u8; 4] = b"DMRG";
const VERSION: u16 = 1;
const TAG_END: u8 = 0;
const TAG_OPENING: u8 = 1;
const TAG_CLOSING: u8 = 2;

/// Which side of a vertical boundary piece is solid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaTag {
    /// Coverage starts at this x: solid to the right
    Opening,
    /// Coverage ends at this x: solid to the left
    Closing,
}

/// A change of coverage along `[y0, y1)` at `x1`, closing the slab that
/// started at `x0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeltaRecord {
    pub x0: i32,
    pub x1: i32,
    pub y0: i32,
    pub y1: i32,
    pub tag: DeltaTag,
}

/// Destination of delta records, written in sweep order
pub trait DeltaSink {
    fn push(&mut self, rec: DeltaRecord) -> anyhow::Result<()>;
}

/// Origin of delta records, read back in sweep order
pub trait DeltaSource {
    fn next_record(&mut self) -> anyhow::Result<Option<DeltaRecord>>;
}

impl DeltaSink for Vec<DeltaRecord> {
    fn push(&mut self, rec: DeltaRecord) -> anyhow::Result<()> {
        Vec::push(self, rec);
        Ok(())
    }
}

impl DeltaSink for VecDeque<DeltaRecord> {
    fn push(&mut self, rec: DeltaRecord) -> anyhow::Result<()> {
        self.push_back(rec);
        Ok(())
    }
}

impl DeltaSource for VecDeque<DeltaRecord> {
    fn next_record(&mut self) -> anyhow::Result<Option<DeltaRecord>> {
        Ok(self.pop_front())
    }
}

/// Incremental writer of delta records
pub struct DeltaWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> DeltaWriter<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(MAGIC)?;
        inner.write_u16::<LittleEndian>(VERSION)?;
        Ok(Self { inner, count: 0 })
    }

    pub fn write_record(&mut self, rec: &DeltaRecord) -> io::Result<()> {
        let tag = match rec.tag {
            DeltaTag::Opening => TAG_OPENING,
            DeltaTag::Closing => TAG_CLOSING,
        };
        self.inner.write_u8(tag)?;
        self.inner.write_i32::<LittleEndian>(rec.x0)?;
        self.inner.write_i32::<LittleEndian>(rec.x1)?;
        self.inner.write_i32::<LittleEndian>(rec.y0)?;
        self.inner.write_i32::<LittleEndian>(rec.y1)?;
        self.count += 1;
        Ok(())
    }

    pub fn record_count(&self) -> u64 {
        self.count
    }

    /// Write the trailer and hand back the sink
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.write_u8(TAG_END)?;
        self.inner.write_u64::<LittleEndian>(self.count)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> DeltaSink for DeltaWriter<W> {
    fn push(&mut self, rec: DeltaRecord) -> anyhow::Result<()> {
        self.write_record(&rec).context("failed to write delta record")
    }
}

/// Sequential reader of delta records
pub struct DeltaReader<R: Read> {
    inner: R,
    count: u64,
    finished: bool,
}

impl<R: Read> DeltaReader<R> {
    pub fn new(mut inner: R) -> anyhow::Result<Self> {
        let mut magic = [0u8; 4];
        inner
            .read_exact(&mut magic)
            .context("delta stream is missing its header")?;
        anyhow::ensure!(&magic == MAGIC, "not a delta stream (bad magic {:?})", magic);
        let version = inner.read_u16::<LittleEndian>()?;
        anyhow::ensure!(version == VERSION, "unsupported delta stream version {}", version);
        Ok(Self {
            inner,
            count: 0,
            finished: false,
        })
    }

    /// Next record, or `None` once the trailer has been read and checked
    pub fn read_record(&mut self) -> anyhow::Result<Option<DeltaRecord>> {
        if self.finished {
            return Ok(None);
        }
        let tag = self
            .inner
            .read_u8()
            .context("delta stream truncated before its trailer")?;
        let tag = match tag {
            TAG_OPENING => DeltaTag::Opening,
            TAG_CLOSING => DeltaTag::Closing,
            TAG_END => {
                let expected = self.inner.read_u64::<LittleEndian>()?;
                anyhow::ensure!(
                    expected == self.count,
                    "delta stream trailer claims {} records but {} were read",
                    expected, self.count
                );
                self.finished = true;
                return Ok(None);
            }
            other => anyhow::bail!("corrupt delta stream: unknown record tag {}", other),
        };
        let x0 = self.inner.read_i32::<LittleEndian>()?;
        let x1 = self.inner.read_i32::<LittleEndian>()?;
        let y0 = self.inner.read_i32::<LittleEndian>()?;
        let y1 = self.inner.read_i32::<LittleEndian>()?;
        self.count += 1;
        Ok(Some(DeltaRecord { x0, x1, y0, y1, tag }))
    }

    pub fn records_read(&self) -> u64 {
        self.count
    }
}

impl<R: Read> DeltaSource for DeltaReader<R> {
    fn next_record(&mut self) -> anyhow::Result<Option<DeltaRecord>> {
        self.read_record()
    }
}

enum SpoolStorage {
    Memory(Vec<u8>),
    Disk(BufWriter<File>),
}

/// Staging buffer for one check's delta stream.
///
/// The disk variant uses an anonymous temporary file that the OS reclaims
/// as soon as the spool or its reader is dropped.
pub struct DeltaSpool {
    storage: SpoolStorage,
}

impl DeltaSpool {
    pub fn in_memory() -> Self {
        Self {
            storage: SpoolStorage::Memory(Vec::new()),
        }
    }

    pub fn on_disk() -> anyhow::Result<Self> {
        let file = tempfile::tempfile().context("failed to create delta spill file")?;
        Ok(Self {
            storage: SpoolStorage::Disk(BufWriter::new(file)),
        })
    }

    pub fn is_on_disk(&self) -> bool {
        matches!(self.storage, SpoolStorage::Disk(_))
    }

    /// Switch from writing to reading
    pub fn into_reader(self) -> anyhow::Result<SpoolReader> {
        match self.storage {
            SpoolStorage::Memory(buf) => Ok(SpoolReader::Memory(Cursor::new(buf))),
            SpoolStorage::Disk(writer) => {
                let mut file = writer
                    .into_inner()
                    .map_err(|e| e.into_error())
                    .context("failed to flush delta spill file")?;
                file.seek(SeekFrom::Start(0))
                    .context("failed to rewind delta spill file")?;
                Ok(SpoolReader::Disk(BufReader::new(file)))
            }
        }
    }
}

impl Write for DeltaSpool {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.storage {
            SpoolStorage::Memory(v) => v.write(buf),
            SpoolStorage::Disk(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.storage {
            SpoolStorage::Memory(_) => Ok(()),
            SpoolStorage::Disk(w) => w.flush(),
        }
    }
}

/// Read side of a [`DeltaSpool`]
pub enum SpoolReader {
    Memory(Cursor<Vec<u8>>),
    Disk(BufReader<File>),
}

impl Read for SpoolReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SpoolReader::Memory(c) => c.read(buf),
            SpoolReader::Disk(r) => r.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DeltaRecord> {
        vec![
            DeltaRecord { x0: 0, x1: 0, y0: 0, y1: 10, tag: DeltaTag::Opening },
            DeltaRecord { x0: 0, x1: 20, y0: -5, y1: 10, tag: DeltaTag::Closing },
        ]
    }

    fn write_all(spool: DeltaSpool) -> DeltaSpool {
        let mut writer = DeltaWriter::new(spool).unwrap();
        for rec in sample() {
            writer.write_record(&rec).unwrap();
        }
        assert_eq!(writer.record_count(), 2);
        writer.finish().unwrap()
    }

    fn read_all(spool: DeltaSpool) -> Vec<DeltaRecord> {
        let mut reader = DeltaReader::new(spool.into_reader().unwrap()).unwrap();
        let mut out = Vec::new();
        while let Some(rec) = reader.read_record().unwrap() {
            out.push(rec);
        }
        out
    }

    #[test]
    fn test_memory_spool_stream() {
        let spool = write_all(DeltaSpool::in_memory());
        assert!(!spool.is_on_disk());
        assert_eq!(read_all(spool), sample());
    }

    #[test]
    fn test_disk_spool_stream() {
        let spool = write_all(DeltaSpool::on_disk().unwrap());
        assert!(spool.is_on_disk());
        assert_eq!(read_all(spool), sample());
    }

    #[test]
    fn test_truncated_stream_detected() {
        let mut writer = DeltaWriter::new(Vec::new()).unwrap();
        writer.write_record(&sample()[0]).unwrap();
        let mut bytes = writer.finish().unwrap();
        // Drop the trailer
        bytes.truncate(bytes.len() - 9);

        let mut reader = DeltaReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.read_record().unwrap().is_some());
        assert!(reader.read_record().is_err());
    }

    #[test]
    fn test_bad_magic_rejected() {
        assert!(DeltaReader::new(Cursor::new(b"NOPE\x01\x00".to_vec())).is_err());
    }
}
