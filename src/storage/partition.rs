//! Partition log (component B): the ordered sequence of segments backing
//! one (topic, partition), and the single-writer append/fetch/recovery
//! logic described in spec §4.1.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::record::Record;

use super::segment::Segment;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `replicated_append` with `expected_start_offset > next_offset`: the
    /// upstream is ahead of what this replica can possibly have. Fatal to
    /// the chain (spec §4.1); the caller surfaces `TIMEOUT_ERROR` and tears
    /// the replication stream down.
    #[error("replica is behind: expected_start_offset {expected_start_offset} > next_offset {next_offset}")]
    ReplicaBehind {
        expected_start_offset: i64,
        next_offset: i64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// The result of `append`/`replicated_append` beyond plain success.
#[derive(Debug)]
pub enum ReplicatedAppendOutcome {
    Ok { last_offset: i64 },
    /// This replica is ahead of its upstream; carries every record the
    /// upstream is missing, starting at `expected_start_offset`.
    WriteRepair { records: Vec<Record> },
}

/// A byte range to be returned as a fetch response: a file, a starting
/// position and a length, resolved by the transport as either a
/// zero-copy file-to-socket transfer or a plain `pread` + write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRange {
    pub log_path: PathBuf,
    pub position: u64,
    pub len: u64,
    pub high_water_mark: i64,
}

struct Inner {
    /// Sorted ascending by `base_offset`; the last entry is always the
    /// active (mutable) segment.
    segments: Vec<Segment>,
    next_offset: i64,
}

pub struct PartitionLog {
    topic: String,
    partition: i32,
    dir: PathBuf,
    segment_bytes: u64,
    index_interval_bytes: u64,
    inner: Mutex<Inner>,
}

impl PartitionLog {
    /// Opens the partition directory, creating it (mode `0700`, per spec
    /// §6) if it does not exist, and recovers the active segment per
    /// spec §4.1.
    pub fn open_or_create(
        root: &Path,
        topic: &str,
        partition: i32,
        segment_bytes: u64,
        index_interval_bytes: u64,
    ) -> Result<Self> {
        let dir = root.join(format!("{topic}-{partition}"));
        create_dir_mode_0700(&dir)?;

        let mut base_offsets = existing_segment_base_offsets(&dir)?;
        if base_offsets.is_empty() {
            base_offsets.push(0);
        }

        let mut segments = Vec::with_capacity(base_offsets.len());
        for base_offset in &base_offsets {
            segments.push(Segment::open_or_create(&dir, *base_offset)?);
        }

        let mut next_offset = segments.first().map(|s| s.base_offset).unwrap_or(0);
        if let Some(active) = segments.last_mut() {
            next_offset = active.recover(next_offset)?;
        }

        info!(
            topic,
            partition, next_offset, segments = segments.len(), "partition log opened"
        );

        Ok(Self {
            topic: topic.to_string(),
            partition,
            dir,
            segment_bytes,
            index_interval_bytes,
            inner: Mutex::new(Inner {
                segments,
                next_offset,
            }),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn high_water_mark(&self) -> i64 {
        self.inner.lock().next_offset - 1
    }

    pub fn next_offset(&self) -> i64 {
        self.inner.lock().next_offset
    }

    /// Assigns offsets `next_offset..next_offset+payloads.len()` to
    /// `payloads`, appends them to the active segment, and returns the
    /// last assigned offset.
    pub fn append(&self, payloads: &[Vec<u8>]) -> Result<i64> {
        let mut inner = self.inner.lock();
        let start_offset = inner.next_offset;
        let records: Vec<Record> = payloads
            .iter()
            .enumerate()
            .map(|(i, payload)| Record::new(start_offset + i as i64, payload.clone()))
            .collect();

        self.append_records_locked(&mut inner, &records)?;
        Ok(inner.next_offset - 1)
    }

    /// Applies a downstream-bound replicate request. `records` already
    /// carry their absolute offsets, assigned upstream.
    pub fn replicated_append(
        &self,
        expected_start_offset: i64,
        records: &[Record],
    ) -> Result<ReplicatedAppendOutcome> {
        let mut inner = self.inner.lock();

        if expected_start_offset > inner.next_offset {
            return Err(Error::ReplicaBehind {
                expected_start_offset,
                next_offset: inner.next_offset,
            });
        }

        if expected_start_offset < inner.next_offset {
            warn!(
                topic = %self.topic,
                partition = self.partition,
                expected_start_offset,
                next_offset = inner.next_offset,
                "replica ahead of upstream, issuing write-repair"
            );
            let missing = self.read_records_from_locked(&inner, expected_start_offset)?;
            return Ok(ReplicatedAppendOutcome::WriteRepair { records: missing });
        }

        self.append_records_locked(&mut inner, records)?;
        Ok(ReplicatedAppendOutcome::Ok {
            last_offset: inner.next_offset - 1,
        })
    }

    fn append_records_locked(&self, inner: &mut Inner, records: &[Record]) -> Result<()> {
        for record in records {
            let active = inner
                .segments
                .last_mut()
                .expect("a partition log always has at least one segment");
            active.append(record, self.index_interval_bytes)?;
            inner.next_offset = record.offset + 1;
        }

        let should_roll = inner
            .segments
            .last()
            .map(|s| s.log_len() >= self.segment_bytes)
            .unwrap_or(false);
        if should_roll {
            self.roll_locked(inner)?;
        }

        Ok(())
    }

    fn roll_locked(&self, inner: &mut Inner) -> Result<()> {
        let new_base_offset = inner.next_offset;
        let new_segment = Segment::open_or_create(&self.dir, new_base_offset)?;
        debug!(
            topic = %self.topic,
            partition = self.partition,
            new_base_offset,
            "rolling to a new segment"
        );
        inner.segments.push(new_segment);
        Ok(())
    }

    /// Reads every record starting at `from_offset` through the current
    /// `next_offset`, used to build a write-repair payload.
    fn read_records_from_locked(&self, inner: &Inner, from_offset: i64) -> Result<Vec<Record>> {
        let range = self.fetch_range_locked(inner, from_offset, u64::MAX, None)?;
        if range.len == 0 {
            return Ok(Vec::new());
        }
        let segment = inner
            .segments
            .iter()
            .find(|s| s.log_path() == range.log_path)
            .expect("fetch_range always resolves to a segment we still hold");
        let bytes = segment.read_range(range.position, Some(range.len))?;
        let mut cursor = std::io::Cursor::new(bytes);
        let mut out = Vec::new();
        let total = cursor.get_ref().len() as u64;
        while cursor.position() < total {
            let record = <Record as crate::codec::traits::ReadType<_>>::read(&mut cursor)
                .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
            if record.offset >= from_offset {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Offset-to-byte lookup and range sizing, per spec §4.1.
    pub fn fetch(
        &self,
        start_offset: i64,
        max_bytes: usize,
        limit: Option<i64>,
    ) -> Result<FetchRange> {
        let inner = self.inner.lock();
        self.fetch_range_locked(&inner, start_offset, max_bytes as u64, limit)
    }

    fn fetch_range_locked(
        &self,
        inner: &Inner,
        start_offset: i64,
        max_bytes: u64,
        limit: Option<i64>,
    ) -> Result<FetchRange> {
        let high_water_mark = inner.next_offset - 1;

        let earliest_base_offset = inner
            .segments
            .first()
            .map(|s| s.base_offset)
            .unwrap_or(0);
        let clamped_start = start_offset.max(earliest_base_offset);

        if clamped_start > high_water_mark || inner.segments.is_empty() {
            let path = inner
                .segments
                .last()
                .map(|s| s.log_path().to_path_buf())
                .unwrap_or_else(|| self.dir.join("empty.log"));
            return Ok(FetchRange {
                log_path: path,
                position: 0,
                len: 0,
                high_water_mark,
            });
        }

        let seg_idx = inner
            .segments
            .iter()
            .rposition(|s| s.base_offset <= clamped_start)
            .unwrap_or(0);
        let segment = &inner.segments[seg_idx];

        let relative = u32::try_from((clamped_start - segment.base_offset).max(0))
            .unwrap_or(u32::MAX);
        let floor_position = segment.floor_position(relative);

        let mut position = floor_position;
        let mut end_position = floor_position;
        let mut total_bytes: u64 = 0;
        let mut qualifying_count: i64 = 0;

        loop {
            if position + 12 > segment.log_len() {
                break;
            }
            let mut header = [0u8; 12];
            segment.read_header_at(position, &mut header)?;
            let record_offset = i64::from_be_bytes(header[0..8].try_into().unwrap());
            let payload_len = i32::from_be_bytes(header[8..12].try_into().unwrap()) as u64;
            let record_total = 12 + payload_len;

            if position + record_total > segment.log_len() {
                break;
            }

            let tentative_total = total_bytes + record_total;
            if tentative_total > max_bytes && end_position > floor_position {
                // Always make progress with at least one record even if
                // it alone exceeds max_bytes, matching "fetch a single
                // record that's larger than max_bytes" Kafka semantics.
                break;
            }

            let qualifies = record_offset >= clamped_start;
            if qualifies {
                if let Some(l) = limit {
                    if l >= 0 && qualifying_count >= l {
                        break;
                    }
                }
            }

            total_bytes = tentative_total;
            position += record_total;
            end_position = position;
            if qualifies {
                qualifying_count += 1;
            }

            if tentative_total >= max_bytes {
                break;
            }
        }

        Ok(FetchRange {
            log_path: segment.log_path().to_path_buf(),
            position: floor_position,
            len: end_position - floor_position,
            high_water_mark,
        })
    }

    /// Removes the partition's directory. Deletion is rename-to-tombstone
    /// then unlink so a concurrent reader never observes a half-removed
    /// directory; any file descriptor already open on a segment in this
    /// partition stays valid until its owning [`PartitionLog`] is dropped,
    /// since an unlinked file remains readable through an open fd.
    pub fn delete(&self) -> Result<()> {
        let tombstone = self.dir.with_file_name(format!(
            ".deleted-{}",
            self.dir.file_name().unwrap().to_string_lossy()
        ));
        fs::rename(&self.dir, &tombstone)?;
        fs::remove_dir_all(&tombstone)?;
        Ok(())
    }
}

fn create_dir_mode_0700(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    match fs::DirBuilder::new().mode(0o700).create(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

fn existing_segment_base_offsets(dir: &Path) -> io::Result<Vec<i64>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(stem) = name.strip_suffix(".log") {
            if let Ok(base_offset) = stem.parse::<i64>() {
                out.push(base_offset);
            }
        }
    }
    out.sort_unstable();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path, segment_bytes: u64, index_interval_bytes: u64) -> PartitionLog {
        PartitionLog::open_or_create(dir, "t", 0, segment_bytes, index_interval_bytes).unwrap()
    }

    #[test]
    fn creation_makes_the_partition_directory() {
        let root = tempdir().unwrap();
        let _log = open(root.path(), 1 << 20, 4096);
        assert!(root.path().join("t-0").is_dir());
    }

    #[test]
    fn single_record_roundtrips() {
        let root = tempdir().unwrap();
        let log = open(root.path(), 1 << 20, 4096);

        let offset = log
            .append(&[b"from each according to his ability".to_vec()])
            .unwrap();
        assert_eq!(offset, 0);
        assert_eq!(log.high_water_mark(), 0);

        let range = log.fetch(offset, usize::MAX, None).unwrap();
        assert_eq!(range.len, 12 + "from each according to his ability".len() as u64);
    }

    #[test]
    fn fetch_at_offset_above_high_water_mark_is_empty() {
        let root = tempdir().unwrap();
        let log = open(root.path(), 1 << 20, 4096);
        log.append(&[b"x".to_vec()]).unwrap();

        let range = log.fetch(1, usize::MAX, None).unwrap();
        assert_eq!(range.len, 0);
    }

    /// The `index_bug` fixture pinned in spec §4.1 and §8: with an index
    /// interval that crosses roughly every 10 records, a fetch at offset
    /// 10 on a 100-record partition must return exactly 90 records (not 0,
    /// not 100), and the high-water mark must be 99. After a second
    /// 100-record append, a fetch at offset 10 must return 190 records
    /// with high-water mark 199.
    #[test]
    fn index_bug_fixture() {
        let root = tempdir().unwrap();
        // Each record is 12 + 15 = 27 bytes; interval ~200 bytes crosses
        // roughly every 8 records, comparable to the spec's "~10 records"
        // framing without depending on an exact multiple.
        let log = open(root.path(), u64::MAX, 200);

        let payloads: Vec<Vec<u8>> = (0..100).map(|_| b"123456789abcdef".to_vec()).collect();
        log.append(&payloads).unwrap();

        let range = log.fetch(0, usize::MAX, None).unwrap();
        let count = count_records_in_range(&range, 0);
        assert_eq!(count, 100);
        assert_eq!(log.high_water_mark(), 99);

        let range = log.fetch(10, usize::MAX, None).unwrap();
        let count = count_records_in_range(&range, 10);
        assert_eq!(count, 90);
        assert_eq!(log.high_water_mark(), 99);

        log.append(&payloads).unwrap();

        let range = log.fetch(0, usize::MAX, None).unwrap();
        assert_eq!(count_records_in_range(&range, 0), 200);
        assert_eq!(log.high_water_mark(), 199);

        let range = log.fetch(10, usize::MAX, None).unwrap();
        assert_eq!(count_records_in_range(&range, 10), 190);
        assert_eq!(log.high_water_mark(), 199);
    }

    /// The byte range a sparse index lookup returns may start before
    /// `fetch_offset` (the nearest indexed entry at or below it, per
    /// spec §4.1 step 2); only records at or after `fetch_offset` count.
    fn count_records_in_range(range: &FetchRange, fetch_offset: i64) -> usize {
        use std::os::unix::fs::FileExt;
        let file = std::fs::File::open(&range.log_path).unwrap();
        let mut buf = vec![0u8; range.len as usize];
        file.read_exact_at(&mut buf, range.position).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let mut count = 0;
        let total = cursor.get_ref().len() as u64;
        while cursor.position() < total {
            let record = <Record as crate::codec::traits::ReadType<_>>::read(&mut cursor).unwrap();
            if record.offset >= fetch_offset {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn rollover_happens_after_oversized_batch() {
        let root = tempdir().unwrap();
        let log = open(root.path(), 64, 4096);

        let offset = log.append(&[vec![0u8; 200]]).unwrap();
        assert_eq!(offset, 0);
        // The batch itself exceeded segment_bytes; rollover happens after
        // the append completes, so the next append lands in a new segment.
        log.append(&[b"next".to_vec()]).unwrap();
        assert_eq!(log.high_water_mark(), 1);
    }

    #[test]
    fn replicated_append_ahead_triggers_write_repair() {
        let root = tempdir().unwrap();
        let log = open(root.path(), 1 << 20, 4096);
        log.append(&(0..100).map(|_| b"x".to_vec()).collect::<Vec<_>>())
            .unwrap();

        match log.replicated_append(95, &[]).unwrap() {
            ReplicatedAppendOutcome::WriteRepair { records } => {
                assert_eq!(records.len(), 5);
                assert_eq!(records[0].offset, 95);
                assert_eq!(records.last().unwrap().offset, 99);
            }
            other => panic!("expected write repair, got {other:?}"),
        }
    }

    #[test]
    fn replicated_append_behind_is_fatal() {
        let root = tempdir().unwrap();
        let log = open(root.path(), 1 << 20, 4096);
        log.append(&[b"x".to_vec()]).unwrap();

        let err = log.replicated_append(100, &[]).unwrap_err();
        assert!(matches!(err, Error::ReplicaBehind { .. }));
    }
}
