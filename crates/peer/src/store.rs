use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use p2p_config::CHUNK_SUFFIX;

use crate::discovery::DiscoveryTable;
use crate::LOGGER;

#[derive(Default)]
struct FileChunks {
    /// Indices with an artifact on disk.
    present: BTreeSet<u32>,
    /// Known once the metadata sidecar has been read.
    total: Option<u32>,
}

/// Owns the on-disk chunk artifacts of one peer and the per-file record of
/// which indices are present. `save_chunk` and `assemble` run under the same
/// per-file lock, so completing the set and assembling is one atomic step.
///
/// Map entries are created under the coarse map lock and never removed, the
/// same lifetime rule the discovery table follows.
pub struct ChunkStore {
    peer_dir: PathBuf,
    files: Mutex<HashMap<String, Arc<Mutex<FileChunks>>>>,
    discovery: Arc<DiscoveryTable>,
}

impl ChunkStore {
    pub fn new(root: &Path, peer_id: u32, discovery: Arc<DiscoveryTable>) -> Self {
        Self {
            peer_dir: root.join(peer_id.to_string()),
            files: Mutex::new(HashMap::new()),
            discovery,
        }
    }

    fn entry(&self, file: &str) -> Arc<Mutex<FileChunks>> {
        let mut files = self.files.lock().unwrap();
        Arc::clone(files.entry(file.to_string()).or_default())
    }

    /// `<root>/<peer>/<file>.ch<i>`
    pub fn chunk_path(&self, file: &str, chunk_id: u32) -> PathBuf {
        self.peer_dir.join(format!("{file}{CHUNK_SUFFIX}{chunk_id}"))
    }

    /// Creates the peer directory if needed and indexes every `<name>.ch<i>`
    /// artifact already present. Files that do not match the pattern are
    /// ignored.
    pub fn scan_local(&self) -> io::Result<()> {
        fs::create_dir_all(&self.peer_dir)?;
        for dir_entry in fs::read_dir(&self.peer_dir)? {
            let name = dir_entry?.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(position) = name.rfind(CHUNK_SUFFIX) else {
                continue;
            };
            let file = &name[..position];
            let Ok(chunk_id) = name[position + CHUNK_SUFFIX.len()..].parse() else {
                continue;
            };
            let entry = self.entry(file);
            entry.lock().unwrap().present.insert(chunk_id);
        }
        Ok(())
    }

    /// Records how many chunks `file` splits into, from its metadata.
    pub fn set_total(&self, file: &str, total_chunks: u32) {
        let entry = self.entry(file);
        entry.lock().unwrap().total = Some(total_chunks);
    }

    pub fn has_chunk(&self, file: &str, chunk_id: u32) -> bool {
        let entry = self.entry(file);
        let state = entry.lock().unwrap();
        state.present.contains(&chunk_id)
    }

    /// Sorted snapshot of the locally present chunk indices.
    pub fn available(&self, file: &str) -> Vec<u32> {
        let entry = self.entry(file);
        let state = entry.lock().unwrap();
        state.present.iter().copied().collect()
    }

    /// Writes the chunk artifact (tmp file + rename, so readers never see a
    /// partial artifact), records the index, and attempts assembly. Returns
    /// whether this save completed the file. Re-received chunks overwrite.
    pub fn save_chunk(&self, file: &str, chunk_id: u32, bytes: &[u8]) -> io::Result<bool> {
        let entry = self.entry(file);
        let mut state = entry.lock().unwrap();

        let path = self.chunk_path(file, chunk_id);
        let staged = self.peer_dir.join(format!("{file}{CHUNK_SUFFIX}{chunk_id}.tmp"));
        fs::write(&staged, bytes)?;
        fs::rename(&staged, &path)?;

        state.present.insert(chunk_id);
        self.assemble_with(file, &state)
    }

    /// Concatenates all chunk artifacts into `<root>/<peer>/<file>` once the
    /// set is complete, then destroys the file's discovery state. Returns
    /// whether assembly happened.
    pub fn assemble(&self, file: &str) -> io::Result<bool> {
        let entry = self.entry(file);
        let state = entry.lock().unwrap();
        self.assemble_with(file, &state)
    }

    fn assemble_with(&self, file: &str, state: &FileChunks) -> io::Result<bool> {
        let Some(total) = state.total else {
            return Ok(false);
        };
        if state.present.len() != total as usize {
            return Ok(false);
        }

        let output_path = self.peer_dir.join(file);
        let mut output = fs::File::create(&output_path)?;
        for chunk_id in 0..total {
            let path = self.chunk_path(file, chunk_id);
            let mut chunk = match fs::File::open(&path) {
                Ok(chunk) => chunk,
                Err(e) => {
                    LOGGER.error(format!("cannot open {}: {e}", path.display()));
                    return Ok(false);
                }
            };
            io::copy(&mut chunk, &mut output)?;
        }

        LOGGER.success(format!(
            "file '{file}' assembled at {}",
            output_path.display()
        ));
        self.discovery.clear(file);
        Ok(true)
    }
}
