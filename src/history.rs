use crate::search::ShortCase;

/// Recently visited cases, newest first, each case at most once.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<ShortCase>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `case` to the front, dropping any older entry with its id.
    pub fn push(&mut self, case: ShortCase) {
        self.entries.retain(|c| c.id != case.id);
        self.entries.insert(0, case);
    }

    pub fn get(&self, index: usize) -> Option<&ShortCase> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShortCase> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
