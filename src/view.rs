use crate::model::Loadout;

/// Per-surface list of loadouts plus the selected entry. The list is
/// replaced wholesale on every successful fetch; navigation clamps at the
/// bounds instead of wrapping.
#[derive(Debug, Default)]
pub struct ViewState {
    loadouts: Vec<Loadout>,
    active_index: Option<usize>,
    fetch_generation: u64,
}

impl ViewState {
    pub fn loadouts(&self) -> &[Loadout] {
        &self.loadouts
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn active_loadout(&self) -> Option<&Loadout> {
        self.active_index.and_then(|index| self.loadouts.get(index))
    }

    pub fn is_empty(&self) -> bool {
        self.loadouts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.loadouts.len()
    }

    /// Replaces the list and clamps the selection; an empty list clears it.
    pub fn set_loadouts(&mut self, loadouts: Vec<Loadout>) {
        self.loadouts = loadouts;
        self.active_index = if self.loadouts.is_empty() {
            None
        } else {
            Some(
                self.active_index
                    .unwrap_or(0)
                    .min(self.loadouts.len() - 1),
            )
        };
    }

    /// No-op outside `[0, len)`.
    pub fn select_index(&mut self, index: usize) {
        if index < self.loadouts.len() {
            self.active_index = Some(index);
        }
    }

    pub fn next(&mut self) {
        if let Some(index) = self.active_index {
            if index + 1 < self.loadouts.len() {
                self.active_index = Some(index + 1);
            }
        }
    }

    pub fn previous(&mut self) {
        if let Some(index) = self.active_index {
            if index > 0 {
                self.active_index = Some(index - 1);
            }
        }
    }

    /// 1-based `index/total` string for the overlay header.
    pub fn counter_label(&self) -> String {
        match self.active_index {
            Some(index) => format!("{}/{}", index + 1, self.loadouts.len()),
            None => "0/0".to_owned(),
        }
    }

    /// Marks the start of a fetch. Overlapping fetches can resolve out of
    /// order; only the response carrying the latest generation may be
    /// applied.
    pub fn begin_fetch(&mut self) -> u64 {
        self.fetch_generation += 1;
        self.fetch_generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.fetch_generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::ViewState;
    use crate::model::Loadout;

    fn loadouts(count: usize) -> Vec<Loadout> {
        (0..count)
            .map(|i| Loadout {
                name: format!("L{i}"),
                ..Loadout::default()
            })
            .collect()
    }

    #[test]
    fn empty_list_has_no_selection() {
        let mut state = ViewState::default();
        state.set_loadouts(Vec::new());
        assert_eq!(state.active_index(), None);
        assert_eq!(state.counter_label(), "0/0");
    }

    #[test]
    fn replace_clamps_selection_to_new_length() {
        let mut state = ViewState::default();
        state.set_loadouts(loadouts(5));
        state.select_index(4);
        state.set_loadouts(loadouts(2));
        assert_eq!(state.active_index(), Some(1));
        state.set_loadouts(Vec::new());
        assert_eq!(state.active_index(), None);
    }

    #[test]
    fn select_index_out_of_range_is_a_noop() {
        let mut state = ViewState::default();
        state.set_loadouts(loadouts(3));
        state.select_index(1);
        state.select_index(3);
        assert_eq!(state.active_index(), Some(1));
        state.select_index(usize::MAX);
        assert_eq!(state.active_index(), Some(1));
    }

    #[test]
    fn navigation_clamps_without_wraparound() {
        let mut state = ViewState::default();
        state.set_loadouts(loadouts(3));
        state.previous();
        assert_eq!(state.active_index(), Some(0));
        state.next();
        state.next();
        assert_eq!(state.active_index(), Some(2));
        state.next();
        assert_eq!(state.active_index(), Some(2));
        state.previous();
        assert_eq!(state.active_index(), Some(1));
    }

    #[test]
    fn counter_is_one_based() {
        let mut state = ViewState::default();
        state.set_loadouts(loadouts(4));
        state.select_index(2);
        assert_eq!(state.counter_label(), "3/4");
    }

    #[test]
    fn stale_generation_is_detected() {
        let mut state = ViewState::default();
        let first = state.begin_fetch();
        let second = state.begin_fetch();
        assert!(!state.is_current(first));
        assert!(state.is_current(second));
    }
}
