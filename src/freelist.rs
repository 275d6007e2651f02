//! Free-sector manager (spec.md §4.3): the singly-linked list of unallocated
//! sectors rooted at `root.free`, encoded using the Directory shape
//! (spec.md §3: "free sectors are encoded using the Directory shape for
//! simplicity").
//!
//! Per the REDESIGN note in spec.md §9, this is a set of stateless
//! functions operating on the sector store rather than a long-lived handle
//! caching list state across calls — the only persistent state is on disk,
//! in `root.free`.

use log::debug;

use crate::error::{Error, Result};
use crate::record::Directory;
use crate::sector::{Backing, SectorStore};

/// Dequeues the head of the free list, returning its sector index. Updates
/// `root.free` to the head's `frwd` before returning. The caller is
/// responsible for overwriting the returned sector with its new contents;
/// this function has already read past it (spec.md §4.3).
pub fn allocate<S: Backing>(store: &mut SectorStore<S>) -> Result<u32> {
    let root = Directory::decode(&store.read_sector(0)?);
    let head = root.free;
    if head == 0 {
        return Err(Error::NoSpace);
    }
    let head_dir = Directory::decode(&store.read_sector(head)?);

    let mut root = root;
    root.free = head_dir.frwd;
    store.write_sector(0, &root.encode())?;

    debug!("freelist: allocated sector {head}, new head {}", root.free);
    Ok(head)
}

/// Appends sector `n` to the tail of the free list, overwriting it with the
/// canonical free-Directory pattern. Writes the new sector's contents
/// before linking it in, so a crash mid-append leaks `n` rather than
/// double-linking it (spec.md §4.3).
pub fn append_free<S: Backing>(store: &mut SectorStore<S>, n: u32) -> Result<()> {
    store.write_sector(n, &Directory::free_node(0).encode())?;

    let root = Directory::decode(&store.read_sector(0)?);
    if root.free == 0 {
        let mut root = root;
        root.free = n;
        store.write_sector(0, &root.encode())?;
    } else {
        let tail = find_tail(store, root.free)?;
        let mut tail_dir = Directory::decode(&store.read_sector(tail)?);
        tail_dir.frwd = n;
        store.write_sector(tail, &tail_dir.encode())?;
    }
    debug!("freelist: appended sector {n}");
    Ok(())
}

/// Walks the free list starting at `head` until it finds the node whose
/// `frwd` is 0.
fn find_tail<S: Backing>(store: &SectorStore<S>, head: u32) -> Result<u32> {
    let mut cur = head;
    loop {
        let d = Directory::decode(&store.read_sector(cur)?);
        if d.frwd == 0 {
            return Ok(cur);
        }
        cur = d.frwd;
    }
}

/// Counts free sectors by traversal, for the property tests in spec.md §8
/// and for CLI diagnostics. Not used on any hot path.
pub fn count_free<S: Backing>(store: &SectorStore<S>) -> Result<usize> {
    let root = Directory::decode(&store.read_sector(0)?);
    let mut count = 0;
    let mut cur = root.free;
    while cur != 0 {
        count += 1;
        let d = Directory::decode(&store.read_sector(cur)?);
        cur = d.frwd;
    }
    Ok(count)
}
