//! The set of probe tasks still to dispatch and every identity ever queued.

use crate::extract::extract_links;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tracing::debug;
use url::Url;
use webprobe_core::{HttpMethod, ProbeTask};
use web_surface::baseline::origin_of;

#[derive(Debug, Default)]
struct FrontierState {
    pending: VecDeque<ProbeTask>,
    visited: HashSet<ProbeTask>,
}

/// Thread-safe frontier. A task identity enters `pending` at most once per scan;
/// `visited` keeps every identity ever queued so it is never dispatched twice.
#[derive(Debug, Default)]
pub struct Frontier {
    /// Origin extracted links must share. When unset, the origin of the page
    /// the links were found on is used.
    scope: Option<String>,
    state: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(origin: impl Into<String>) -> Self {
        Frontier { scope: Some(origin.into()), state: Mutex::default() }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Add initial candidates. Returns how many were new.
    pub fn seed<I: IntoIterator<Item = ProbeTask>>(&self, tasks: I) -> usize {
        let mut st = self.lock();
        let mut added = 0;
        for t in tasks {
            if insert(&mut st, canonical(t)) {
                added += 1;
            }
        }
        added
    }

    /// Queue one task unless its identity was seen before.
    pub fn enqueue(&self, task: ProbeTask) -> bool {
        insert(&mut self.lock(), canonical(task))
    }

    /// Remove and return the oldest pending task. `None` only means nothing is
    /// pending right now; in-flight work may still add more.
    pub fn take(&self) -> Option<ProbeTask> {
        self.lock().pending.pop_front()
    }

    /// Parse links out of `body`, resolve them against `base_url` and queue
    /// the in-scope ones once per method. Returns how many tasks were added.
    pub fn extract_and_enqueue(&self, body: &str, base_url: &Url, methods: &[HttpMethod]) -> usize {
        let scope = match &self.scope {
            Some(s) => s.clone(),
            None => match origin_of(base_url.as_str()) {
                Some(o) => o,
                None => return 0,
            },
        };
        let links = extract_links(body, base_url);
        let mut st = self.lock();
        let mut added = 0;
        for link in links {
            if link.origin().ascii_serialization() != scope {
                continue;
            }
            for &m in methods {
                if insert(&mut st, ProbeTask::new(link.to_string(), m)) {
                    added += 1;
                }
            }
        }
        if added > 0 {
            debug!(base = %base_url, added, "frontier expanded");
        }
        added
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn is_drained(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn has_visited(&self, task: &ProbeTask) -> bool {
        self.lock().visited.contains(&canonical(task.clone()))
    }
}

fn insert(st: &mut FrontierState, task: ProbeTask) -> bool {
    if st.visited.contains(&task) {
        return false;
    }
    st.visited.insert(task.clone());
    st.pending.push_back(task);
    true
}

/// Normalize the URL of a task so equivalent spellings share one identity.
/// Scheme-less URLs are left as given.
fn canonical(mut task: ProbeTask) -> ProbeTask {
    if let Ok(mut u) = Url::parse(task.url.trim()) {
        if u.scheme() == "http" || u.scheme() == "https" {
            u.set_fragment(None);
            task.url = u.to_string();
        }
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn seed_drops_duplicates() {
        let f = Frontier::new();
        let added = f.seed(vec![
            ProbeTask::get("http://h/a"),
            ProbeTask::get("http://h/a"),
            ProbeTask::get("http://h/a#x"),
            ProbeTask::new("http://h/a", HttpMethod::Head),
        ]);
        assert_eq!(added, 2);
        assert_eq!(f.pending_len(), 2);
        assert_eq!(f.take().unwrap().url, "http://h/a");
        assert!(f.take().is_some());
        assert!(f.take().is_none());
        assert!(!f.enqueue(ProbeTask::get("http://h/a")));
        assert_eq!(f.visited_len(), 2);
    }

    #[test]
    fn extraction_stays_on_origin_and_skips_visited() {
        let f = Frontier::with_scope("http://h");
        f.seed(vec![ProbeTask::get("http://h/admin")]);
        f.take();
        let base = Url::parse("http://h/admin").unwrap();
        let body = r#"<a href="/admin">self</a><a href="/admin/users">u</a><a href="http://evil.test/x">x</a>"#;
        assert_eq!(f.extract_and_enqueue(body, &base, &[HttpMethod::Get]), 1);
        assert_eq!(f.take().unwrap().url, "http://h/admin/users");
        assert_eq!(f.extract_and_enqueue(body, &base, &[HttpMethod::Get]), 0);
        assert!(f.is_drained());
    }

    #[test]
    fn concurrent_takes_hand_out_each_task_once() {
        let f = Arc::new(Frontier::new());
        f.seed((0..1000).map(|i| ProbeTask::get(format!("http://h/{}", i))));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = f.clone();
                std::thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(t) = f.take() {
                        got.push(t.url);
                    }
                    got
                })
            })
            .collect();
        let mut all: Vec<String> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        assert_eq!(all.len(), 1000);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
