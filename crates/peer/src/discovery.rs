use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use p2p_core::entities::ProviderRecord;

use crate::LOGGER;

#[derive(Default)]
struct FileDiscovery {
    /// Entry `i` lists the peers that claim to hold chunk `i`.
    providers: Vec<Vec<ProviderRecord>>,
    /// True only while RESPONSE datagrams for this file are being collected.
    window_open: bool,
}

/// Per-file provider knowledge gathered from RESPONSE datagrams, plus the
/// response-window flag that gates their acceptance.
///
/// Map entries are created under the coarse map lock and never removed while
/// the process runs; `clear` empties the contained data only. That keeps
/// every handed-out per-file lock valid for the process lifetime.
#[derive(Default)]
pub struct DiscoveryTable {
    files: Mutex<HashMap<String, Arc<Mutex<FileDiscovery>>>>,
}

impl DiscoveryTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, file: &str) -> Arc<Mutex<FileDiscovery>> {
        let mut files = self.files.lock().unwrap();
        Arc::clone(files.entry(file.to_string()).or_default())
    }

    fn lookup(&self, file: &str) -> Option<Arc<Mutex<FileDiscovery>>> {
        self.files.lock().unwrap().get(file).cloned()
    }

    /// Allocates one empty provider list per chunk of `file`.
    pub fn init(&self, file: &str, total_chunks: usize) {
        let entry = self.entry(file);
        let mut state = entry.lock().unwrap();
        state.providers = vec![Vec::new(); total_chunks];
    }

    pub fn open_window(&self, file: &str) {
        let entry = self.entry(file);
        entry.lock().unwrap().window_open = true;
    }

    pub fn close_window(&self, file: &str) {
        if let Some(entry) = self.lookup(file) {
            entry.lock().unwrap().window_open = false;
        }
    }

    /// False for files this peer never started searching.
    pub fn window_open(&self, file: &str) -> bool {
        self.lookup(file)
            .is_some_and(|entry| entry.lock().unwrap().window_open)
    }

    /// Records `provider` for each chunk id, deduplicating by endpoint.
    /// Out-of-range ids are logged and skipped.
    pub fn record(&self, file: &str, chunks: &[u32], provider: &ProviderRecord) {
        let entry = self.entry(file);
        let mut state = entry.lock().unwrap();
        record_into(&mut state, file, chunks, provider);
    }

    /// Window check and record under one per-file lock acquisition, so a
    /// RESPONSE racing the window close can never slip in afterwards.
    /// Returns whether the offer was recorded.
    pub fn record_if_open(&self, file: &str, chunks: &[u32], provider: &ProviderRecord) -> bool {
        let Some(entry) = self.lookup(file) else {
            return false;
        };
        let mut state = entry.lock().unwrap();
        if !state.window_open {
            return false;
        }
        record_into(&mut state, file, chunks, provider);
        true
    }

    /// Copy of the provider lists for the planner; empty if never searched.
    pub fn snapshot(&self, file: &str) -> Vec<Vec<ProviderRecord>> {
        self.lookup(file)
            .map(|entry| entry.lock().unwrap().providers.clone())
            .unwrap_or_default()
    }

    /// Drops all per-file data. Safe to call for files never searched.
    pub fn clear(&self, file: &str) {
        if let Some(entry) = self.lookup(file) {
            let mut state = entry.lock().unwrap();
            state.providers.clear();
            state.window_open = false;
        }
    }
}

fn record_into(state: &mut FileDiscovery, file: &str, chunks: &[u32], provider: &ProviderRecord) {
    for &chunk_id in chunks {
        let Some(candidates) = state.providers.get_mut(chunk_id as usize) else {
            LOGGER.error(format!("chunk {chunk_id} is out of range for '{file}'"));
            continue;
        };
        if candidates.iter().any(|known| known.same_endpoint(provider)) {
            continue;
        }
        candidates.push(provider.clone());
    }
}
