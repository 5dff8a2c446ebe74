//! Shared candidate pool filled by concurrent probes.

use parking_lot::Mutex;

use super::types::Candidate;

/// Append-only collection of candidates from all probes.
///
/// Each probe appends its batch once. Batches are tagged with the probe
/// index so the drained order does not depend on thread scheduling.
#[derive(Debug, Default)]
pub struct CandidatePool {
    batches: Mutex<Vec<(usize, Vec<Candidate>)>>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one probe's candidates.
    pub fn append(&self, probe_index: usize, candidates: Vec<Candidate>) {
        if candidates.is_empty() {
            return;
        }
        self.batches.lock().push((probe_index, candidates));
    }

    /// Total number of pooled candidates.
    pub fn len(&self) -> usize {
        self.batches.lock().iter().map(|(_, c)| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the pool, returning candidates in probe index order.
    pub fn into_candidates(self) -> Vec<Candidate> {
        let mut batches = self.batches.into_inner();
        batches.sort_by_key(|(index, _)| *index);
        batches.into_iter().flat_map(|(_, c)| c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_probe_order() {
        let pool = CandidatePool::new();
        pool.append(2, vec![Candidate::new(80.0, 30)]);
        pool.append(0, vec![Candidate::new(90.0, 10), Candidate::new(85.0, 11)]);
        pool.append(1, Vec::new());
        pool.append(1, vec![Candidate::new(70.0, 20)]);

        assert_eq!(pool.len(), 4);
        let offsets: Vec<i64> = pool.into_candidates().iter().map(|c| c.offset_ms).collect();
        assert_eq!(offsets, vec![10, 11, 20, 30]);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let pool = CandidatePool::new();
        std::thread::scope(|s| {
            for i in 0..8 {
                let pool = &pool;
                s.spawn(move || pool.append(i, vec![Candidate::new(50.0, i as i64); 3]));
            }
        });
        assert_eq!(pool.len(), 24);
    }
}
