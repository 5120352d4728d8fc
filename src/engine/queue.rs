//! Sample queue.
//!
//! Holds the specimens waiting for (or done with) a run, the current
//! selection, and the id counter. The queue is never allowed to become
//! empty.

use tracing::info;

use crate::error::{BenchError, BenchResult};
use crate::types::{Geometry, Sample, SampleStatus, TestMethod};

#[derive(Debug, Clone)]
pub struct SampleQueue {
    samples: Vec<Sample>,
    selected: Option<u32>,
    next_id: u32,
}

impl SampleQueue {
    /// Build a queue from initial names. An empty list seeds one default
    /// sample so the queue is never empty.
    pub fn new(names: &[String], geometry: Geometry, method: TestMethod) -> Self {
        let mut queue = Self {
            samples: Vec::new(),
            selected: None,
            next_id: 1,
        };
        for name in names {
            queue.add(Some(name.clone()), geometry, method);
        }
        if queue.samples.is_empty() {
            queue.add(None, geometry, method);
        }
        queue.selected = queue.samples.first().map(|s| s.id);
        queue
    }

    /// Append a sample with the next id. Returns the new id.
    pub fn add(&mut self, name: Option<String>, geometry: Geometry, method: TestMethod) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("S-{id:03}"));

        info!(id, name = %name, geometry = %geometry, "Sample added");
        self.samples.push(Sample::new(id, name, geometry, method));
        if self.selected.is_none() {
            self.selected = Some(id);
        }
        id
    }

    /// Remove a sample. The last remaining sample can't be removed.
    pub fn remove(&mut self, id: u32) -> BenchResult<Sample> {
        let idx = self.position(id)?;
        if self.samples.len() <= 1 {
            return Err(BenchError::LastSample);
        }

        let removed = self.samples.remove(idx);
        if self.selected == Some(id) {
            self.selected = self.samples.first().map(|s| s.id);
        }
        info!(id, name = %removed.name, "Sample removed");
        Ok(removed)
    }

    pub fn select(&mut self, id: u32) -> BenchResult<()> {
        self.position(id)?;
        self.selected = Some(id);
        Ok(())
    }

    pub fn selected_id(&self) -> Option<u32> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Sample> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Record a completed run's peak stress on the sample.
    pub fn complete(&mut self, id: u32, peak_stress: f64) -> BenchResult<&Sample> {
        let idx = self.position(id)?;
        let sample = &mut self.samples[idx];
        sample.status = SampleStatus::Completed;
        sample.result = Some(peak_stress);
        Ok(sample)
    }

    pub fn get(&self, id: u32) -> Option<&Sample> {
        self.samples.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_completed()).count()
    }

    fn position(&self, id: u32) -> BenchResult<usize> {
        self.samples
            .iter()
            .position(|s| s.id == id)
            .ok_or(BenchError::SampleNotFound(id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(names: &[&str]) -> SampleQueue {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        SampleQueue::new(&names, Geometry::default(), TestMethod::Iso527_2)
    }

    #[test]
    fn test_new_selects_first() {
        let q = queue(&["A-101", "A-102"]);
        assert_eq!(q.len(), 2);
        assert_eq!(q.selected().unwrap().name, "A-101");
    }

    #[test]
    fn test_empty_names_seed_one_sample() {
        let q = queue(&[]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.selected().unwrap().name, "S-001");
    }

    #[test]
    fn test_ids_auto_increment_and_stay_unique() {
        let mut q = queue(&["A"]);
        let b = q.add(Some("B".into()), Geometry::default(), TestMethod::Iso527_2);
        let c = q.add(None, Geometry::default(), TestMethod::Iso527_2);
        assert_eq!(b, 2);
        assert_eq!(c, 3);
        q.remove(b).unwrap();
        let d = q.add(None, Geometry::default(), TestMethod::Iso527_2);
        assert_eq!(d, 4);
        assert_eq!(q.get(d).unwrap().name, "S-004");
    }

    #[test]
    fn test_blank_name_gets_default() {
        let mut q = queue(&["A"]);
        let id = q.add(Some("   ".into()), Geometry::default(), TestMethod::Iso527_2);
        assert_eq!(q.get(id).unwrap().name, "S-002");
    }

    #[test]
    fn test_cannot_remove_last_sample() {
        let mut q = queue(&["A", "B"]);
        q.remove(1).unwrap();
        assert_eq!(q.remove(2).unwrap_err(), BenchError::LastSample);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_remove_unknown() {
        let mut q = queue(&["A", "B"]);
        assert_eq!(q.remove(99).unwrap_err(), BenchError::SampleNotFound(99));
    }

    #[test]
    fn test_remove_selected_moves_selection() {
        let mut q = queue(&["A", "B", "C"]);
        q.select(2).unwrap();
        q.remove(2).unwrap();
        assert_eq!(q.selected_id(), Some(1));
    }

    #[test]
    fn test_complete_sets_status_and_result() {
        let mut q = queue(&["A"]);
        let s = q.complete(1, 71.5).unwrap();
        assert_eq!(s.status, SampleStatus::Completed);
        assert_eq!(s.result_text(), "71.50 MPa");
        assert_eq!(q.completed_count(), 1);
    }

    #[test]
    fn test_select_unknown_fails() {
        let mut q = queue(&["A"]);
        assert!(q.select(5).is_err());
        assert_eq!(q.selected_id(), Some(1));
    }
}
