//! Track id allocation.

use tactus_midi::TrackId;

pub(crate) struct TrackRegistry {
    slots: Vec<bool>,
    count: usize,
}

impl TrackRegistry {
    pub fn new(max_tracks: usize) -> Self {
        Self {
            slots: vec![false; max_tracks],
            count: 0,
        }
    }

    /// Lowest free id.
    pub fn allocate(&mut self) -> Option<TrackId> {
        let index = self.slots.iter().position(|used| !used)?;
        self.slots[index] = true;
        self.count += 1;
        Some(index as TrackId)
    }

    pub fn release(&mut self, track: TrackId) -> bool {
        match self.slots.get_mut(track as usize) {
            Some(used) if *used => {
                *used = false;
                self.count -= 1;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn contains(&self, track: TrackId) -> bool {
        self.slots.get(track as usize).copied().unwrap_or(false)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, used)| **used)
            .map(|(i, _)| i as TrackId)
            .collect()
    }
}
