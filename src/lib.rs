/**
 * boxfs: a self-contained, single-file container filesystem
 *
 * The container is a regular host file, exactly SECTOR_SIZE * NUM_SECTORS
 * bytes long, partitioned into fixed-size sectors. Every sector is one of:
 *
 *   - the root Directory (sector 0, always)
 *   - a Directory extension (chained from another Directory via `frwd`)
 *   - a File sector (chained into a user file's content via `frwd`/`back`)
 *   - a free-list node (a Directory-shaped sector linked via `frwd`, head
 *     cached in root.free)
 *
 * General layout:
 *
 * .                        | sector
 * root Directory           | 0
 * (directory extensions,   |
 *  file chains, and free   | 1 .. NUM_SECTORS
 *  list nodes, interleaved |
 *  as allocation demands)  |
 *
 * A Directory holds a 16-byte header plus 31 FileIDX slots (16 bytes each);
 * when all 31 fill up, an extension Directory is allocated and linked via
 * `frwd`, giving the logical directory more room without moving anything
 * already there. A File holds an 8-byte header plus 504 bytes of opaque
 * user data; a file's content is the concatenation of its chain's `data`,
 * truncated at the terminal sector's recorded size.
 *
 * Module layout, leaves first: `sector` (positioned I/O), `record` (byte
 * codecs), `freelist` (the free-sector singly-linked list), `dir` (path
 * resolution and the directory engine), `file` (the file engine). `Container`
 * below composes these into the verb set the CLI binary (`src/main.rs`)
 * drives.
 */

pub mod dir;
pub mod error;
pub mod file;
pub mod freelist;
pub mod pathspec;
pub mod record;
pub mod sector;

use std::fs::OpenOptions;
use std::path::Path as HostPath;

use log::info;

pub use crate::dir::DirEntry;
pub use crate::error::{Component, Error, Result};
pub use crate::pathspec::Path;
use crate::record::{Directory, FileRecord, SlotKind};
use crate::sector::{Backing, SectorStore, CONTAINER_LEN, NUM_SECTORS};

/// An open container: one backing store, held for the duration of a single
/// verb invocation (spec.md §5 EXPANSION — the original C tool reopens the
/// host file per sector access; this is the permitted alternative of
/// keeping one handle open per verb).
pub struct Container<S> {
    store: SectorStore<S>,
}

impl Container<std::fs::File> {
    /// Creates a brand-new container at `host_path` (the `init` verb).
    /// Fails with `AlreadyExists` unless `force` is set (spec.md §6: "init"
    /// refused if the target exists, unless overwrite mode is selected").
    pub fn create(host_path: &HostPath, force: bool) -> Result<Self> {
        if host_path.exists() && !force {
            return Err(Error::AlreadyExists);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(host_path)?;
        file.set_len(CONTAINER_LEN)?;
        set_container_permissions(&file)?;

        let mut store = SectorStore::new(file);
        init_layout(&mut store)?;
        info!("initialized container {} ({} sectors)", host_path.display(), NUM_SECTORS);
        Ok(Container { store })
    }

    /// Opens an existing container for any verb other than `init`.
    pub fn open(host_path: &HostPath) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(host_path)?;
        Ok(Container {
            store: SectorStore::new(file),
        })
    }
}

#[cfg(unix)]
fn set_container_permissions(file: &std::fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_container_permissions(_file: &std::fs::File) -> Result<()> {
    Ok(())
}

/// Writes the root Directory (`free` pointing at sector 1) and links every
/// remaining sector into the free list in sector-index order (spec.md §3
/// "On initialization, every non-root sector is a free-list node linked in
/// sector-index order").
fn init_layout<S: Backing>(store: &mut SectorStore<S>) -> Result<()> {
    let mut root = Directory::empty(0, 0);
    root.free = 1;
    store.write_sector(0, &root.encode())?;

    for s in 1..NUM_SECTORS {
        let frwd = if s + 1 < NUM_SECTORS { s + 1 } else { 0 };
        store.write_sector(s, &Directory::free_node(frwd).encode())?;
    }
    Ok(())
}

impl<S: Backing> Container<S> {
    /// Creates an empty directory at `path` (replacing any existing entry
    /// of the same name — spec.md §4.4 `create`'s "replace" semantics).
    pub fn mkdir(&mut self, path: &Path) -> Result<()> {
        self.create_entry(path, SlotKind::Dir).map(|_| ())
    }

    /// Creates an empty user file at `path` (replace semantics, as `mkdir`).
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.create_entry(path, SlotKind::UserFile).map(|_| ())
    }

    /// Overwrites (creating if absent) the user file at `path` with `data`
    /// (the `gulp` verb; spec.md §4.5 `overwrite`).
    pub fn write_file(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        let head = self.resolve_or_create_user_file(path)?;
        let size = file::overwrite(&mut self.store, head, data)?;
        self.update_parent_size(path, head, size)
    }

    /// Appends `data` to the user file at `path` (the `append` verb;
    /// spec.md §4.5 `append`). The file must already exist.
    pub fn append_file(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        let r = self.resolve_user_file(path)?;
        let (_, size) = file::append(&mut self.store, r.head, r.size, data)?;
        self.update_parent_size(path, r.head, size)
    }

    /// Reads the full contents of the user file at `path` (the `cat` verb).
    pub fn read_file(&mut self, path: &Path) -> Result<Vec<u8>> {
        let r = self.resolve_user_file(path)?;
        file::read(&self.store, r.head, r.size)
    }

    /// Lists `path`'s entries (the `ls` verb; spec.md §4.4 `list`). If
    /// `path` resolves to a user file, returns a single-element listing for
    /// that file, matching the original's "emit a single `UserFile <name>`
    /// line" behavior; the CLI layer turns this into text.
    pub fn list(&mut self, path: &Path) -> Result<Vec<DirEntry>> {
        let r = dir::resolve(&self.store, path)?;
        match r.kind {
            SlotKind::Dir => dir::list(&self.store, r.head),
            SlotKind::UserFile => {
                let name = path
                    .last()
                    .expect("a non-root path resolved to a user file")
                    .to_string();
                Ok(vec![DirEntry {
                    name,
                    kind: SlotKind::UserFile,
                    size: r.size,
                    link: r.head,
                }])
            }
            SlotKind::Free => unreachable!("resolve never yields a free slot"),
        }
    }

    /// Removes the entry at `path`, reaping its subtree first (the `rm`
    /// verb; spec.md §4.4 `remove`).
    pub fn remove(&mut self, path: &Path) -> Result<()> {
        let name = path.last().ok_or(Error::BadName {
            name: String::new(),
            reason: "cannot remove the root",
        })?;
        let parent = dir::resolve(&self.store, &path.parent())?;
        dir::remove_entry(&mut self.store, parent.head, name)
    }

    /// Counts free sectors by traversal. Not part of the core verb set;
    /// exposed for diagnostics and the property tests in spec.md §8.
    pub fn count_free(&self) -> Result<usize> {
        freelist::count_free(&self.store)
    }

    fn create_entry(&mut self, path: &Path, kind: SlotKind) -> Result<u32> {
        let name = path.last().ok_or(Error::BadName {
            name: String::new(),
            reason: "cannot create the root",
        })?;
        let parent = dir::resolve(&self.store, &path.parent())?;
        if parent.kind != SlotKind::Dir {
            return Err(Error::NotFound(Component(name.to_string())));
        }

        let content = match kind {
            // `back` is a placeholder here: the parent-slot sector isn't
            // known until `dir::create_entry` reserves a slot, so it patches
            // this field in before the child sector is written.
            SlotKind::Dir => Directory::empty(0, 0).encode(),
            SlotKind::UserFile => FileRecord::empty(0).encode(),
            SlotKind::Free => unreachable!("create_entry is never called with Free"),
        };

        match dir::create_entry(&mut self.store, parent.head, name, kind, &content) {
            Ok(sector) => Ok(sector),
            Err(Error::AlreadyExists) => {
                dir::remove_entry(&mut self.store, parent.head, name)?;
                dir::create_entry(&mut self.store, parent.head, name, kind, &content)
            }
            Err(e) => Err(e),
        }
    }

    fn resolve_user_file(&self, path: &Path) -> Result<dir::Resolution> {
        let r = dir::resolve(&self.store, path)?;
        if r.kind != SlotKind::UserFile {
            let name = path.last().unwrap_or("/").to_string();
            return Err(Error::NotFound(Component(name)));
        }
        Ok(r)
    }

    fn resolve_or_create_user_file(&mut self, path: &Path) -> Result<u32> {
        match dir::resolve(&self.store, path) {
            Ok(r) if r.kind == SlotKind::UserFile => Ok(r.head),
            Ok(_) => {
                let name = path.last().unwrap_or("/").to_string();
                Err(Error::NotFound(Component(name)))
            }
            Err(Error::NotFound(_)) => self.create_entry(path, SlotKind::UserFile),
            Err(e) => Err(e),
        }
    }

    fn update_parent_size(&mut self, path: &Path, head: u32, size: u16) -> Result<()> {
        let parent = dir::resolve(&self.store, &path.parent())?;
        dir::update_size(&mut self.store, parent.head, head, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_container() -> Container<std::fs::File> {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        Container::create(&path, false).unwrap()
    }

    #[test]
    fn init_then_mkdir_then_ls_is_empty() {
        let mut c = fresh_container();
        let p = Path::parse("a").unwrap();
        c.mkdir(&p).unwrap();
        assert!(c.list(&p).unwrap().is_empty());
    }

    #[test]
    fn touch_then_ls_parent_shows_single_userfile_line() {
        let mut c = fresh_container();
        c.mkdir(&Path::parse("a").unwrap()).unwrap();
        c.touch(&Path::parse("a/b").unwrap()).unwrap();
        let entries = c.list(&Path::parse("a").unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "b");
        assert_eq!(entries[0].kind, SlotKind::UserFile);
    }

    #[test]
    fn gulp_then_cat_round_trips() {
        let mut c = fresh_container();
        c.write_file(&Path::parse("f").unwrap(), b"hello").unwrap();
        assert_eq!(c.read_file(&Path::parse("f").unwrap()).unwrap(), b"hello");
    }

    #[test]
    fn append_law() {
        let mut c = fresh_container();
        let p = Path::parse("f").unwrap();
        c.touch(&p).unwrap();
        c.append_file(&p, b"abc").unwrap();
        c.append_file(&p, b"def").unwrap();
        assert_eq!(c.read_file(&p).unwrap(), b"abcdef");
    }

    #[test]
    fn replace_law_discards_old_content() {
        let mut c = fresh_container();
        let p = Path::parse("f").unwrap();
        c.write_file(&p, &vec![0x41u8; 2000]).unwrap();
        let consumed = c.count_free().unwrap();
        c.touch(&p).unwrap();
        let after_touch = c.count_free().unwrap();
        assert!(after_touch > consumed, "touch must reap the old chain");
        c.write_file(&p, b"B").unwrap();
        assert_eq!(c.read_file(&p).unwrap(), b"B");
    }

    #[test]
    fn reap_law_on_rm() {
        let mut c = fresh_container();
        c.mkdir(&Path::parse("a").unwrap()).unwrap();
        c.touch(&Path::parse("a/b").unwrap()).unwrap();
        c.write_file(&Path::parse("a/b").unwrap(), &vec![0u8; 2000])
            .unwrap();
        let before = c.count_free().unwrap();
        c.remove(&Path::parse("a").unwrap()).unwrap();
        let after = c.count_free().unwrap();
        assert!(after > before);
        assert!(matches!(
            c.read_file(&Path::parse("a/b").unwrap()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn directory_extension_boundary() {
        let mut c = fresh_container();
        c.mkdir(&Path::parse("d").unwrap()).unwrap();
        for i in 0..32 {
            let name = format!("d/f{i}");
            c.touch(&Path::parse(&name).unwrap()).unwrap();
        }
        let entries = c.list(&Path::parse("d").unwrap()).unwrap();
        assert_eq!(entries.len(), 32);
        assert!(entries.iter().any(|e| e.name == "f31"));
    }

    #[test]
    fn missing_path_is_not_found_and_container_is_untouched() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        let mut c = Container::create(&path, false).unwrap();
        c.mkdir(&Path::parse("a").unwrap()).unwrap();

        let before = std::fs::read(&path).unwrap();
        let result = c.read_file(&Path::parse("missing").unwrap());
        assert!(matches!(result, Err(Error::NotFound(_))));
        // A failed lookup performs only reads; the container bytes are
        // unchanged (spec.md §8 property 9).
        let after = std::fs::read(&path).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        assert!(matches!(
            Container::create(&path, false),
            Err(Error::AlreadyExists)
        ));
        assert!(Container::create(&path, true).is_ok());
    }
}
