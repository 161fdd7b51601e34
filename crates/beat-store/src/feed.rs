use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use beat_types::Address;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::record::RootRecord;
use crate::traits::{check_append, FeedStore};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Largest record payload accepted on recovery.
const MAX_RECORD_SIZE: u32 = 64 * 1024;

/// Append-only feed logs, one file per address.
///
/// On-disk format of `<root>/<address hex>.log`:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized RootRecord)]
/// ...
/// ```
///
/// Reading a feed walks the file front to back. Entries that fail the CRC
/// check, fail to decode, carry a bad signature, or do not advance the
/// version are skipped; a truncated tail (a write cut short by a crash) ends
/// the scan. A killed writer therefore never corrupts the history.
///
/// The verified head of each feed is cached together with the length it was
/// read at. A feed that grew since (another handle or process appended) is
/// only scanned, and verified, from the cached framed length onwards.
#[derive(Debug)]
pub struct DiskFeedStore {
    root: PathBuf,
    read_only: bool,
    append_lock: Mutex<HashMap<Address, FeedTail>>,
}

/// Verified state of a feed file at a known length.
#[derive(Clone, Debug, Default)]
struct FeedTail {
    head: Option<RootRecord>,
    /// End of the last well-framed entry.
    framed_len: u64,
    /// File length when the tail was read.
    file_len: u64,
}

/// Records found by a scan and where the scan stopped.
struct Scan {
    records: Vec<RootRecord>,
    framed_len: u64,
    file_len: u64,
}

impl DiskFeedStore {
    /// Open (or create) a feed directory.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            read_only: false,
            append_lock: Mutex::new(HashMap::new()),
        })
    }

    /// Open an existing feed directory without write access.
    pub fn open_read_only(root: &Path) -> StoreResult<Self> {
        if !root.is_dir() {
            return Err(StoreError::Unavailable {
                path: root.to_path_buf(),
                reason: "feed directory does not exist".into(),
            });
        }
        Ok(Self {
            root: root.to_path_buf(),
            read_only: true,
            append_lock: Mutex::new(HashMap::new()),
        })
    }

    fn path_for(&self, address: &Address) -> PathBuf {
        self.root.join(format!("{}.log", address.to_hex()))
    }

    /// Bring the cached tail for `address` up to date with the file.
    fn refresh(&self, tails: &mut HashMap<Address, FeedTail>, address: &Address) -> StoreResult<FeedTail> {
        let file_len = match fs::metadata(self.path_for(address)) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tails.remove(address);
                return Ok(FeedTail::default());
            }
            Err(e) => return Err(e.into()),
        };
        let cached = tails.get(address).cloned();
        let tail = match cached {
            Some(tail) if tail.file_len == file_len => return Ok(tail),
            Some(tail) if tail.file_len < file_len => {
                let scan = self.scan_from(address, tail.framed_len, tail.head.clone())?;
                FeedTail {
                    head: scan.records.last().cloned().or(tail.head),
                    framed_len: scan.framed_len,
                    file_len: scan.file_len,
                }
            }
            _ => {
                let scan = self.scan_from(address, 0, None)?;
                FeedTail {
                    head: scan.records.last().cloned(),
                    framed_len: scan.framed_len,
                    file_len: scan.file_len,
                }
            }
        };
        tails.insert(*address, tail.clone());
        Ok(tail)
    }

    /// Walk the feed file from `offset`, accepting only records that
    /// advance on `prev`.
    fn scan_from(&self, address: &Address, offset: u64, prev: Option<RootRecord>) -> StoreResult<Scan> {
        let path = self.path_for(address);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Scan {
                    records: Vec::new(),
                    framed_len: 0,
                    file_len: 0,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;
        let mut records: Vec<RootRecord> = Vec::new();
        let mut last = prev;
        let mut offset = offset;

        while offset + HEADER_SIZE as u64 <= file_len {
            let mut header = [0u8; HEADER_SIZE];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0
                || length > MAX_RECORD_SIZE
                || offset + HEADER_SIZE as u64 + length as u64 > file_len
            {
                warn!(%address, offset, length, file_len, "truncated feed entry; stopping recovery");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(%address, offset, "truncated feed entry; stopping recovery");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            offset += HEADER_SIZE as u64 + length as u64;

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(%address, offset, expected = expected_crc, actual = actual_crc, "CRC mismatch; skipping feed entry");
                continue;
            }

            let record: RootRecord = match bincode::deserialize(&payload) {
                Ok(r) => r,
                Err(e) => {
                    warn!(%address, offset, error = %e, "undecodable feed entry; skipping");
                    continue;
                }
            };
            if let Err(e) = check_append(address, last.as_ref(), &record) {
                warn!(%address, offset, error = %e, "rejected feed entry; skipping");
                continue;
            }
            last = Some(record.clone());
            records.push(record);
        }

        debug!(%address, scanned = records.len(), framed_len = offset, "feed scan complete");
        Ok(Scan {
            records,
            framed_len: offset,
            file_len,
        })
    }
}

impl FeedStore for DiskFeedStore {
    fn head(&self, address: &Address) -> StoreResult<Option<RootRecord>> {
        let mut tails = self.append_lock.lock().expect("feed lock poisoned");
        Ok(self.refresh(&mut tails, address)?.head)
    }

    fn records(&self, address: &Address) -> StoreResult<Vec<RootRecord>> {
        Ok(self.scan_from(address, 0, None)?.records)
    }

    fn append(&self, address: &Address, record: &RootRecord) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let mut tails = self.append_lock.lock().expect("feed lock poisoned");
        let tail = self.refresh(&mut tails, address)?;
        check_append(address, tail.head.as_ref(), record)?;

        let payload =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut entry = Vec::with_capacity(HEADER_SIZE + payload.len());
        entry.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        entry.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        entry.extend_from_slice(&payload);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(address))?;
        let file_len = file.metadata()?.len();
        if file_len > tail.framed_len {
            warn!(%address, file_len, framed_len = tail.framed_len, "discarding torn feed tail before append");
            file.set_len(tail.framed_len)?;
        }
        file.write_all(&entry)?;
        file.sync_data()?;

        let framed_len = tail.framed_len + entry.len() as u64;
        tails.insert(
            *address,
            FeedTail {
                head: Some(record.clone()),
                framed_len,
                file_len: framed_len,
            },
        );
        debug!(%address, version = record.version, root = %record.root.short_hex(), "feed append");
        Ok(())
    }
}
