//! Directory engine (spec.md §4.4): path resolution, slot reservation, and
//! the create/list/remove verbs over directory extension chains.
//!
//! Per the REDESIGN note in spec.md §9, path resolution returns an explicit
//! [`Resolution`] value rather than mutating a shared "current position"
//! struct, and chain walks are expressed as plain loops over a
//! sector-loader rather than recursive reopen-per-step reads.

use crate::error::{Component, Error, Result};
use crate::freelist;
use crate::pathspec::Path;
use crate::record::{name_to_string, pad_name, Directory, FileIdx, SlotKind, SlotName};
use crate::sector::{Backing, SectorStore};

/// One live entry as seen by [`list`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: SlotKind,
    pub size: u16,
    /// Sector at which the entry's own content begins (a directory's head
    /// sector, or a file's first sector).
    pub link: u32,
}

/// The result of resolving a path to the slot and sector that hold it.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Head sector of the resolved directory or file.
    pub head: u32,
    pub kind: SlotKind,
    pub size: u16,
    /// `(slot sector, slot index)` of the `FileIdx` that points at `head`,
    /// in the parent directory's extension chain. `None` only for the
    /// container root, which has no containing slot.
    pub slot: Option<(u32, usize)>,
}

/// Resolves a path against the root directory (sector 0), walking one
/// component at a time. An empty path resolves to the root itself.
pub fn resolve<S: Backing>(store: &SectorStore<S>, path: &Path) -> Result<Resolution> {
    let mut head = 0u32;
    let mut kind = SlotKind::Dir;
    let mut size = 0u16;
    let mut slot = None;

    for comp in path.components() {
        if kind != SlotKind::Dir {
            return Err(Error::NotFound(Component(comp.clone())));
        }
        let padded = pad_name(comp.as_bytes());
        match find_slot(store, head, &padded)? {
            Some((psec, idx, entry)) => {
                head = entry.link;
                kind = entry.kind(psec)?;
                size = entry.size;
                slot = Some((psec, idx));
            }
            None => return Err(Error::NotFound(Component(comp.clone()))),
        }
    }

    Ok(Resolution { head, kind, size, slot })
}

/// Lists the live entries of the directory whose extension chain starts at
/// `head`, walking every extension sector.
pub fn list<S: Backing>(store: &SectorStore<S>, head: u32) -> Result<Vec<DirEntry>> {
    let mut out = Vec::new();
    let mut cur = head;
    loop {
        let d = Directory::decode(&store.read_sector(cur)?);
        for slot in d.idx.iter() {
            if slot.is_free() {
                continue;
            }
            out.push(DirEntry {
                name: name_to_string(&slot.name),
                kind: slot.kind(cur)?,
                size: slot.size,
                link: slot.link,
            });
        }
        if d.frwd == 0 {
            break;
        }
        cur = d.frwd;
    }
    Ok(out)
}

/// Creates a new entry named `name` under the directory at `parent_head`,
/// allocating its own sector and writing `content` into it before linking
/// it into a reserved slot — new content lands on disk before anything can
/// reference it (spec.md §4.3's append ordering, reused here).
///
/// Fails with `AlreadyExists` if `name` is already present. Replace-on-
/// exists is the caller's job (spec.md §4.4: remove first, then create).
pub fn create_entry<S: Backing>(
    store: &mut SectorStore<S>,
    parent_head: u32,
    name: &str,
    kind: SlotKind,
    content: &[u8; crate::sector::SECTOR_SIZE],
) -> Result<u32> {
    let padded = pad_name(name.as_bytes());
    if find_slot(store, parent_head, &padded)?.is_some() {
        return Err(Error::AlreadyExists);
    }

    let (psec, idx) = reserve_slot(store, parent_head)?;

    // A new child Directory's `back` points at the parent slot's own
    // sector, which is only known now that the slot has been reserved — it
    // may be an extension sector, not `parent_head` itself.
    let mut content = *content;
    if kind == SlotKind::Dir {
        let mut child = Directory::decode(&content);
        child.back = psec;
        content = child.encode();
    }

    let new_sector = freelist::allocate(store)?;
    store.write_sector(new_sector, &content)?;

    let mut pdir = Directory::decode(&store.read_sector(psec)?);
    pdir.idx[idx] = FileIdx {
        link: new_sector,
        name: padded,
        kind_byte: kind.to_byte(),
        size: 0,
    };
    store.write_sector(psec, &pdir.encode())?;

    Ok(new_sector)
}

/// Updates the `size` field of the slot that points at `head` within the
/// extension chain rooted at `dir_head`. Used by the file engine after
/// writing new content, so the slot is only updated once the bytes it
/// describes are already on disk.
pub fn update_size<S: Backing>(
    store: &mut SectorStore<S>,
    dir_head: u32,
    head: u32,
    size: u16,
) -> Result<()> {
    let mut cur = dir_head;
    loop {
        let mut d = Directory::decode(&store.read_sector(cur)?);
        if let Some(slot) = d.idx.iter_mut().find(|s| !s.is_free() && s.link == head) {
            slot.size = size;
            store.write_sector(cur, &d.encode())?;
            return Ok(());
        }
        if d.frwd == 0 {
            return Err(Error::Corrupt {
                sector: head,
                reason: "no parent slot references this sector",
            });
        }
        cur = d.frwd;
    }
}

/// Removes the entry named `name` from the directory at `parent_head`.
/// Reaps the entry's own sectors (recursively, for a directory) before
/// clearing its slot — the REDESIGN-flagged fix for the original's
/// clear-then-reap ordering, which could leak sectors permanently if
/// interrupted between the two steps.
pub fn remove_entry<S: Backing>(store: &mut SectorStore<S>, parent_head: u32, name: &str) -> Result<()> {
    let padded = pad_name(name.as_bytes());
    let (psec, idx, entry) = find_slot(store, parent_head, &padded)?
        .ok_or_else(|| Error::NotFound(Component(name.to_string())))?;

    match entry.kind(psec)? {
        SlotKind::Dir => reap_dir(store, entry.link)?,
        SlotKind::UserFile => crate::file::reap_chain(store, entry.link)?,
        SlotKind::Free => unreachable!("find_slot never returns a free slot"),
    }

    let mut pdir = Directory::decode(&store.read_sector(psec)?);
    pdir.idx[idx] = FileIdx::FREE;
    store.write_sector(psec, &pdir.encode())?;
    Ok(())
}

/// Recursively reaps every child of the directory rooted at `head`, then
/// reclaims the directory's own extension-chain sectors. Children are
/// reaped bottom-up so nothing below `head` is ever referenced again once
/// this returns.
fn reap_dir<S: Backing>(store: &mut SectorStore<S>, head: u32) -> Result<()> {
    for entry in list(store, head)? {
        match entry.kind {
            SlotKind::Dir => reap_dir(store, entry.link)?,
            SlotKind::UserFile => crate::file::reap_chain(store, entry.link)?,
            SlotKind::Free => unreachable!("list never yields a free slot"),
        }
    }

    let mut cur = head;
    loop {
        let d = Directory::decode(&store.read_sector(cur)?);
        let next = d.frwd;
        freelist::append_free(store, cur)?;
        if next == 0 {
            break;
        }
        cur = next;
    }
    Ok(())
}

/// Searches the extension chain rooted at `head` for a non-free slot whose
/// name matches `padded`, first match wins.
fn find_slot<S: Backing>(
    store: &SectorStore<S>,
    head: u32,
    padded: &SlotName,
) -> Result<Option<(u32, usize, FileIdx)>> {
    let mut cur = head;
    loop {
        let d = Directory::decode(&store.read_sector(cur)?);
        if let Some((idx, slot)) = d
            .idx
            .iter()
            .enumerate()
            .find(|(_, s)| s.name_matches(padded))
        {
            return Ok(Some((cur, idx, *slot)));
        }
        if d.frwd == 0 {
            return Ok(None);
        }
        cur = d.frwd;
    }
}

/// Finds the first free slot in the extension chain rooted at `head`,
/// extending the chain with a freshly allocated sector if every existing
/// extension is full (spec.md §4.4: "first-fit across the extension
/// chain, growing it on overflow").
fn reserve_slot<S: Backing>(store: &mut SectorStore<S>, head: u32) -> Result<(u32, usize)> {
    let mut cur = head;
    loop {
        let d = Directory::decode(&store.read_sector(cur)?);
        if let Some(idx) = d.idx.iter().position(|s| s.is_free()) {
            return Ok((cur, idx));
        }
        if d.frwd == 0 {
            break;
        }
        cur = d.frwd;
    }

    let new_ext = freelist::allocate(store)?;
    store.write_sector(new_ext, &Directory::empty(cur, 0).encode())?;

    let mut tail = Directory::decode(&store.read_sector(cur)?);
    tail.frwd = new_ext;
    store.write_sector(cur, &tail.encode())?;

    Ok((new_ext, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::{CONTAINER_LEN, NUM_SECTORS, SECTOR_SIZE};
    use std::cell::RefCell;
    use std::io;

    struct MemStore {
        bytes: RefCell<Vec<u8>>,
    }

    impl io_at::ReadAt for MemStore {
        fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
            let bytes = self.bytes.borrow();
            let pos = pos as usize;
            let n = buf.len().min(bytes.len().saturating_sub(pos));
            buf[..n].copy_from_slice(&bytes[pos..pos + n]);
            Ok(n)
        }
    }
    impl io_at::WriteAt for MemStore {
        fn write_at(&self, buf: &[u8], pos: u64) -> io::Result<usize> {
            let mut bytes = self.bytes.borrow_mut();
            let pos = pos as usize;
            bytes[pos..pos + buf.len()].copy_from_slice(buf);
            Ok(buf.len())
        }
    }

    fn fresh_store() -> SectorStore<MemStore> {
        let mut store = SectorStore::new(MemStore {
            bytes: RefCell::new(vec![0; CONTAINER_LEN as usize]),
        });
        let mut root = Directory::empty(0, 0);
        root.free = 1;
        store.write_sector(0, &root.encode()).unwrap();
        for s in 1..NUM_SECTORS {
            let frwd = if s + 1 < NUM_SECTORS { s + 1 } else { 0 };
            store
                .write_sector(s, &Directory::free_node(frwd).encode())
                .unwrap();
        }
        store
    }

    #[test]
    fn resolve_root_is_trivial() {
        let store = fresh_store();
        let r = resolve(&store, &Path::root()).unwrap();
        assert_eq!(r.head, 0);
        assert_eq!(r.kind, SlotKind::Dir);
        assert!(r.slot.is_none());
    }

    #[test]
    fn create_mkdir_then_resolve() {
        let mut store = fresh_store();
        let content = Directory::empty(0, 0).encode();
        let sector = create_entry(&mut store, 0, "sub", SlotKind::Dir, &content).unwrap();
        let path = Path::parse("sub").unwrap();
        let r = resolve(&store, &path).unwrap();
        assert_eq!(r.head, sector);
        assert_eq!(r.kind, SlotKind::Dir);
    }

    #[test]
    fn duplicate_create_rejected() {
        let mut store = fresh_store();
        let content = Directory::empty(0, 0).encode();
        create_entry(&mut store, 0, "sub", SlotKind::Dir, &content).unwrap();
        assert!(matches!(
            create_entry(&mut store, 0, "sub", SlotKind::Dir, &content),
            Err(Error::AlreadyExists)
        ));
    }

    #[test]
    fn list_skips_free_slots() {
        let mut store = fresh_store();
        let content = Directory::empty(0, 0).encode();
        create_entry(&mut store, 0, "a", SlotKind::Dir, &content).unwrap();
        create_entry(&mut store, 0, "b", SlotKind::Dir, &content).unwrap();
        let entries = list(&store, 0).unwrap();
        assert_eq!(entries.len(), 2);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
    }

    #[test]
    fn remove_then_not_found() {
        let mut store = fresh_store();
        let content = Directory::empty(0, 0).encode();
        create_entry(&mut store, 0, "a", SlotKind::Dir, &content).unwrap();
        remove_entry(&mut store, 0, "a").unwrap();
        let path = Path::parse("a").unwrap();
        assert!(matches!(resolve(&store, &path), Err(Error::NotFound(_))));
    }

    #[test]
    fn reserve_slot_extends_chain_when_full() {
        let mut store = fresh_store();
        let content = Directory::empty(0, 0).encode();
        for i in 0..crate::record::SLOTS_PER_DIR {
            let name = format!("f{i}");
            create_entry(&mut store, 0, &name, SlotKind::Dir, &content).unwrap();
        }
        // 32nd entry should force an extension sector.
        create_entry(&mut store, 0, "overflow", SlotKind::Dir, &content).unwrap();
        let root = Directory::decode(&store.read_sector(0).unwrap());
        assert_ne!(root.frwd, 0);
        let entries = list(&store, 0).unwrap();
        assert_eq!(entries.len(), crate::record::SLOTS_PER_DIR + 1);
    }
}
