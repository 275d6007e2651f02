//! File engine (spec.md §4.5): creation, streaming write/append/read, and
//! reclamation of a user file's forward-chained list of File sectors.
//!
//! Slot-size bookkeeping (the owning `FileIDX.size`) is the caller's job —
//! these functions return the byte count of whatever they last wrote and
//! leave updating the parent directory slot to `dir::update_size`, so that
//! (per spec.md §4.5's failure semantics) a parent-slot write only ever
//! happens once the bytes it describes are already on disk.

use log::debug;

use crate::error::Result;
use crate::freelist;
use crate::record::{FileRecord, FILE_DATA_LEN};
use crate::sector::{Backing, SectorStore};

/// Reads the full contents of the file chain rooted at `head`. Every
/// non-terminal sector contributes all 504 data bytes; the terminal sector
/// contributes only its first `last_size` bytes (spec.md §4.5).
pub fn read<S: Backing>(store: &SectorStore<S>, head: u32, last_size: u16) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut cur = head;
    loop {
        let rec = FileRecord::decode(&store.read_sector(cur)?);
        if rec.frwd == 0 {
            out.extend_from_slice(&rec.data[..last_size as usize]);
            return Ok(out);
        }
        out.extend_from_slice(&rec.data);
        cur = rec.frwd;
    }
}

/// Walks a file chain to its terminal (`frwd == 0`) sector.
fn terminal_of<S: Backing>(store: &SectorStore<S>, head: u32) -> Result<u32> {
    let mut cur = head;
    loop {
        let rec = FileRecord::decode(&store.read_sector(cur)?);
        if rec.frwd == 0 {
            return Ok(cur);
        }
        cur = rec.frwd;
    }
}

/// Reaps every sector of the file chain rooted at `head` back onto the free
/// list (spec.md §4.4 "remove": "for a U subtree, walk the File chain via
/// `frwd` and append each File sector to the free list").
pub fn reap_chain<S: Backing>(store: &mut SectorStore<S>, head: u32) -> Result<()> {
    let mut cur = head;
    loop {
        let rec = FileRecord::decode(&store.read_sector(cur)?);
        let next = rec.frwd;
        freelist::append_free(store, cur)?;
        if next == 0 {
            return Ok(());
        }
        cur = next;
    }
}

/// Frees every sector strictly after `head` in the chain, leaving `head`
/// itself untouched on disk (its contents are about to be rewritten by the
/// caller). Used by `overwrite` to truncate a file to a single sector
/// without disturbing the parent's link to `head`.
fn truncate_after_head<S: Backing>(store: &mut SectorStore<S>, head: u32) -> Result<()> {
    let head_rec = FileRecord::decode(&store.read_sector(head)?);
    let mut cur = head_rec.frwd;
    while cur != 0 {
        let rec = FileRecord::decode(&store.read_sector(cur)?);
        let next = rec.frwd;
        freelist::append_free(store, cur)?;
        cur = next;
    }
    Ok(())
}

/// Streams `data` into the chain starting at `cur` (whose predecessor is
/// `back`), 504 bytes at a time, extending the chain with freshly allocated
/// sectors as needed. `cur`'s previous contents are discarded; every sector
/// from `cur` onward is rewritten. Returns the terminal sector and the
/// number of valid bytes in it.
///
/// A full 504-byte chunk is only followed by a chain extension if more
/// input remains — an exact multiple of 504 bytes terminates on a full,
/// `size = 504` sector rather than allocating a trailing empty one
/// (spec.md §4.5's `overwrite` note).
fn write_chain<S: Backing>(
    store: &mut SectorStore<S>,
    mut cur: u32,
    mut back: u32,
    data: &[u8],
) -> Result<(u32, u16)> {
    let mut offset = 0usize;
    loop {
        let end = (offset + FILE_DATA_LEN).min(data.len());
        let chunk = &data[offset..end];
        let has_more = end < data.len();

        let mut buf = [0u8; FILE_DATA_LEN];
        buf[..chunk.len()].copy_from_slice(chunk);

        if chunk.len() == FILE_DATA_LEN && has_more {
            let next = freelist::allocate(store)?;
            store.write_sector(next, &FileRecord::empty(cur).encode())?;
            store.write_sector(
                cur,
                &FileRecord {
                    back,
                    frwd: next,
                    data: buf,
                }
                .encode(),
            )?;
            back = cur;
            cur = next;
            offset = end;
        } else {
            store.write_sector(
                cur,
                &FileRecord {
                    back,
                    frwd: 0,
                    data: buf,
                }
                .encode(),
            )?;
            return Ok((cur, chunk.len() as u16));
        }
    }
}

/// Overwrites the file chain rooted at `head` with `data`, truncating it to
/// a single (reused) sector first (spec.md §4.5 `overwrite`). Returns the
/// new terminal size to be recorded in the owning `FileIDX`.
pub fn overwrite<S: Backing>(store: &mut SectorStore<S>, head: u32, data: &[u8]) -> Result<u16> {
    truncate_after_head(store, head)?;
    let back = FileRecord::decode(&store.read_sector(head)?).back;
    let (_, size) = write_chain(store, head, back, data)?;
    debug!("file: overwrote chain at {head}, new size {size}");
    Ok(size)
}

/// Appends `data` to the file chain rooted at `head`, whose current terminal
/// sector holds `terminal_size` valid bytes (as recorded in the owning
/// `FileIDX`). Fills the terminal sector's remaining room first, then
/// extends the chain for any data beyond that (spec.md §4.5 `append`).
/// Returns the (possibly new) terminal sector and its new size.
pub fn append<S: Backing>(
    store: &mut SectorStore<S>,
    head: u32,
    terminal_size: u16,
    data: &[u8],
) -> Result<(u32, u16)> {
    if data.is_empty() {
        return Ok((terminal_of(store, head)?, terminal_size));
    }

    let cur = terminal_of(store, head)?;
    let mut rec = FileRecord::decode(&store.read_sector(cur)?);
    let local_size = terminal_size as usize;
    let room = FILE_DATA_LEN - local_size;
    let take = room.min(data.len());
    rec.data[local_size..local_size + take].copy_from_slice(&data[..take]);
    let filled = local_size + take;
    let remaining = &data[take..];

    if remaining.is_empty() {
        store.write_sector(cur, &rec.encode())?;
        debug!("file: appended {take} bytes in place at {cur}, new size {filled}");
        return Ok((cur, filled as u16));
    }

    // Terminal sector is now full; allocate the next one before linking it
    // in, so a crash here leaves an orphan sector rather than a dangling
    // `frwd` (spec.md §4.5 "extend_file" ordering).
    let next = freelist::allocate(store)?;
    store.write_sector(next, &FileRecord::empty(cur).encode())?;
    rec.frwd = next;
    store.write_sector(cur, &rec.encode())?;

    let (terminal, size) = write_chain(store, next, cur, remaining)?;
    debug!("file: appended through to new terminal {terminal}, size {size}");
    Ok((terminal, size))
}
