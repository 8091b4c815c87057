//! [`FramedReader`]: scans a memory-mapped `.cq4` file as a sequence of
//! 4-byte-header framed excerpts.
//!
//! Each frame is `[header: u32 LE][payload: N bytes][padding to a 4-byte
//! boundary]`. The header word packs a 30-bit payload length with a
//! metadata flag and a working (in-progress) flag; see [`HeaderWord`].

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::Result;
use crate::value::Value;
use crate::wire::WireParser;

const LENGTH_MASK: u32 = 0x3FFF_FFFF;
const METADATA_FLAG: u32 = 0x4000_0000;
const WORKING_FLAG: u32 = 0x8000_0000;

/// The queue-level header extracted from the leading metadata frame, if
/// one is present and parses cleanly. Missing fields default as they
/// would in the source queue's own header object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueHeader {
    pub version: i64,
    pub index: i64,
    pub count: i64,
    pub roll_cycle: String,
    pub index_count: i64,
    pub index_spacing: i64,
}

/// A single framed record: its ordinal, byte offset, and raw payload.
///
/// `payload` borrows directly from the reader's memory-mapped view — no
/// copy happens until the wire parser extracts owned `Value`s from it.
#[derive(Debug, Clone, Copy)]
pub struct Excerpt<'a> {
    /// Zero-based ordinal among the frames the caller asked to see.
    pub index: u64,
    /// Absolute byte offset of this frame's header word.
    pub offset: u64,
    /// Payload length in bytes.
    pub length: u32,
    pub is_metadata: bool,
    pub payload: &'a [u8],
}

/// Sentinel `index` used by [`FramedReader::read_excerpt`], which reads a
/// single frame out of sequence and so cannot know its ordinal.
pub const UNKNOWN_INDEX: u64 = u64::MAX;

struct HeaderWord {
    length: u32,
    next_offset: u64,
    is_metadata: bool,
}

/// A read-only, memory-mapped view over a `.cq4` file.
pub struct FramedReader {
    path: PathBuf,
    mmap: Option<Mmap>,
    header: QueueHeader,
}

impl FramedReader {
    /// Opens and memory-maps `path`. An empty file yields a reader with
    /// no mapping and an empty stream, since `mmap` cannot map zero
    /// bytes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();

        if len == 0 {
            return Ok(FramedReader {
                path,
                mmap: None,
                header: QueueHeader::default(),
            });
        }

        // SAFETY: the mapping is read-only; concurrent writer extension
        // is tolerated (see the working-bit check in `header_word_at`),
        // concurrent truncation is the caller's risk, as with any mmap.
        let mmap = unsafe { Mmap::map(&file)? };
        let header = parse_queue_header(&mmap).unwrap_or_default();

        Ok(FramedReader {
            path,
            mmap: Some(mmap),
            header,
        })
    }

    /// The path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The header extracted from the leading metadata frame, if any.
    pub fn header(&self) -> &QueueHeader {
        &self.header
    }

    /// Closes the mapping. Idempotent: calling this more than once, or
    /// on a reader that never mapped anything, is a no-op.
    pub fn close(&mut self) {
        self.mmap = None;
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    fn header_word_at(&self, offset: u64) -> Option<HeaderWord> {
        let data = self.bytes();
        let offset = usize::try_from(offset).ok()?;
        let end = offset.checked_add(4)?;
        let bytes: [u8; 4] = data.get(offset..end)?.try_into().ok()?;
        let word = u32::from_le_bytes(bytes);

        if word == 0 || word & WORKING_FLAG != 0 {
            return None;
        }

        let length = word & LENGTH_MASK;
        let is_metadata = word & METADATA_FLAG != 0;
        let payload_end = end.checked_add(length as usize)?;
        if length == 0 || payload_end > data.len() {
            return None;
        }

        Some(HeaderWord {
            length,
            next_offset: payload_end as u64,
            is_metadata,
        })
    }

    fn excerpt_at(&self, offset: u64, index: u64, header: &HeaderWord) -> Excerpt<'_> {
        let data_start = offset as usize + 4;
        let data_end = data_start + header.length as usize;
        Excerpt {
            index,
            offset,
            length: header.length,
            is_metadata: header.is_metadata,
            payload: &self.bytes()[data_start..data_end],
        }
    }

    /// Iterates frames from the start of the file in order.
    ///
    /// `include_metadata` controls whether metadata frames are surfaced
    /// at all; when they're skipped they also don't consume an index.
    /// `start_index` skips surfaced frames before yielding, without
    /// affecting index numbering.
    pub fn iter_excerpts(&self, include_metadata: bool, start_index: u64) -> ExcerptIter<'_> {
        ExcerptIter {
            reader: self,
            offset: 0,
            index: 0,
            include_metadata,
            start_index,
        }
    }

    /// Reads a single frame at an arbitrary byte `offset`, independent of
    /// sequential iteration. The returned excerpt's `index` is
    /// [`UNKNOWN_INDEX`], since an out-of-sequence read has no ordinal.
    pub fn read_excerpt(&self, offset: u64) -> Option<Excerpt<'_>> {
        let header = self.header_word_at(offset)?;
        Some(self.excerpt_at(offset, UNKNOWN_INDEX, &header))
    }

    /// Counts frames that would be surfaced by [`iter_excerpts`] with the
    /// given `include_metadata` setting, without allocating payload
    /// slices for them.
    pub fn count_messages(&self, include_metadata: bool) -> u64 {
        let mut offset = 0u64;
        let mut count = 0u64;

        while let Some(header) = self.header_word_at(offset) {
            if include_metadata || !header.is_metadata {
                count += 1;
            }
            offset = align4(header.next_offset);
        }

        count
    }
}

fn align4(offset: u64) -> u64 {
    (offset + 3) & !3
}

fn parse_queue_header(mmap: &Mmap) -> Option<QueueHeader> {
    if mmap.len() < 4 {
        return None;
    }
    let word = u32::from_le_bytes(mmap[0..4].try_into().ok()?);
    if word == 0 {
        return None;
    }

    let length = (word & LENGTH_MASK) as usize;
    let is_metadata = word & METADATA_FLAG != 0;
    if !is_metadata || length == 0 || 4 + length > mmap.len() {
        return None;
    }

    let data = &mmap[4..4 + length];
    let mut parser = WireParser::new(data);
    let fields = parser.read_object().ok()?;
    let header_value = fields.get("header")?;
    let header_map = header_value.as_map()?;

    Some(QueueHeader {
        version: header_map.get("version").and_then(Value::as_i64).unwrap_or(0),
        index: header_map.get("index").and_then(Value::as_i64).unwrap_or(0),
        count: header_map.get("count").and_then(Value::as_i64).unwrap_or(0),
        roll_cycle: header_map
            .get("rollCycle")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        index_count: header_map
            .get("indexCount")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        index_spacing: header_map
            .get("indexSpacing")
            .and_then(Value::as_i64)
            .unwrap_or(0),
    })
}

/// Iterator over a [`FramedReader`]'s frames, produced by
/// [`FramedReader::iter_excerpts`].
pub struct ExcerptIter<'a> {
    reader: &'a FramedReader,
    offset: u64,
    index: u64,
    include_metadata: bool,
    start_index: u64,
}

impl<'a> Iterator for ExcerptIter<'a> {
    type Item = Excerpt<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let header = self.reader.header_word_at(self.offset)?;
            let surfaced = self.include_metadata || !header.is_metadata;

            let result = if surfaced && self.index >= self.start_index {
                Some(self.reader.excerpt_at(self.offset, self.index, &header))
            } else {
                None
            };

            if surfaced {
                self.index += 1;
            }
            self.offset = align4(header.next_offset);

            if let Some(excerpt) = result {
                return Some(excerpt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn frame(length: u32, is_metadata: bool, payload: &[u8]) -> Vec<u8> {
        let mut word = length & LENGTH_MASK;
        if is_metadata {
            word |= METADATA_FLAG;
        }
        let mut out = word.to_le_bytes().to_vec();
        out.extend_from_slice(payload);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }

    fn write_temp_file(bytes: &[u8]) -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.into_temp_path()
    }

    #[test]
    fn empty_file_yields_no_excerpts() {
        let path = write_temp_file(&[]);
        let reader = FramedReader::open(&path).unwrap();
        assert_eq!(reader.iter_excerpts(true, 0).count(), 0);
    }

    #[test]
    fn s3_salvage_length_five_payload() {
        // S3: header word 0x00000005, payload E4 48 65 6C 6C 6F (declared
        // length covers only the first 5 bytes).
        let bytes = frame(5, false, &[0xE4, 0x48, 0x65, 0x6C, 0x6C]);
        let path = write_temp_file(&bytes);
        let reader = FramedReader::open(&path).unwrap();
        let excerpts: Vec<_> = reader.iter_excerpts(false, 0).collect();
        assert_eq!(excerpts.len(), 1);
        assert_eq!(excerpts[0].length, 5);
    }

    #[test]
    fn working_bit_terminates_stream() {
        let mut bytes = frame(4, false, &[1, 2, 3, 4]);
        bytes.extend_from_slice(&(WORKING_FLAG | 4).to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        let path = write_temp_file(&bytes);
        let reader = FramedReader::open(&path).unwrap();
        assert_eq!(reader.iter_excerpts(true, 0).count(), 1);
    }

    #[test]
    fn metadata_frames_skipped_by_default_and_unindexed() {
        let mut bytes = frame(4, true, &[9, 9, 9, 9]);
        bytes.extend(frame(4, false, &[1, 2, 3, 4]));
        let path = write_temp_file(&bytes);
        let reader = FramedReader::open(&path).unwrap();
        let excerpts: Vec<_> = reader.iter_excerpts(false, 0).collect();
        assert_eq!(excerpts.len(), 1);
        assert_eq!(excerpts[0].index, 0);
        assert!(!excerpts[0].is_metadata);
    }

    #[test]
    fn double_close_is_a_no_op() {
        let path = write_temp_file(&frame(4, false, &[1, 2, 3, 4]));
        let mut reader = FramedReader::open(&path).unwrap();
        reader.close();
        reader.close();
        assert_eq!(reader.iter_excerpts(true, 0).count(), 0);
    }
}
