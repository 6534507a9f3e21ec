//! Id-indexed slot storage
//!
//! Entities live in `Vec<Option<T>>` slots addressed by their id. Ids come from
//! a monotonic counter (the slot count), are never reused, and iteration
//! visits live entries in ascending id order, which is also insertion order.

pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> Arena<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    /// Id the next inserted value will receive.
    #[inline]
    pub(crate) fn next_id(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Insert a value built from its freshly allocated id.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(u32) -> T) -> u32 {
        let id = self.next_id();
        self.slots.push(Some(build(id)));
        self.live += 1;
        id
    }

    #[inline]
    pub(crate) fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    pub(crate) fn remove(&mut self, id: u32) -> Option<T> {
        let taken = self.slots.get_mut(id as usize).and_then(Option::take);
        if taken.is_some() {
            self.live -= 1;
        }
        taken
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = (u32, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i as u32, v)))
    }

    pub(crate) fn ids(&self) -> Vec<u32> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// First live id that is `>= from`.
    pub(crate) fn next_live_from(&self, from: u32) -> Option<u32> {
        self.slots
            .iter()
            .enumerate()
            .skip(from as usize)
            .find(|(_, slot)| slot.is_some())
            .map(|(i, _)| i as u32)
    }
}
