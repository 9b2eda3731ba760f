use shared::domain::{PhotoId, PhotoPatch, PhotoRecord};

/// Stacking value handed to the first photo of a fresh store.
pub const INITIAL_Z_INDEX: u64 = 1;

/// Photos in creation order plus the stacking counter.
///
/// The counter only moves forward, through [`PhotoStore::next_z_index`] for new
/// photos and [`PhotoStore::bring_to_front`] for existing ones. Equal `z_index`
/// values are ordered by position in the collection, later on top.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    photos: Vec<PhotoRecord>,
    top_z_index: u64,
}

impl Default for PhotoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoStore {
    pub fn new() -> Self {
        Self {
            photos: Vec::new(),
            top_z_index: INITIAL_Z_INDEX,
        }
    }

    fn position(&self, id: PhotoId) -> Option<usize> {
        self.photos.iter().position(|photo| photo.id == id)
    }

    /// Appends `record`. Returns `false` and changes nothing if the id is taken.
    pub fn add(&mut self, record: PhotoRecord) -> bool {
        if self.contains(record.id) {
            return false;
        }
        self.photos.push(record);
        true
    }

    /// Stacks `record` on top with the current counter value and appends it.
    /// A taken id leaves both the collection and the counter as they were.
    pub fn add_on_top(&mut self, mut record: PhotoRecord) -> Option<u64> {
        if self.contains(record.id) {
            return None;
        }
        record.z_index = self.next_z_index();
        let z_index = record.z_index;
        self.photos.push(record);
        Some(z_index)
    }

    pub fn update(&mut self, id: PhotoId, patch: &PhotoPatch) -> Option<&PhotoRecord> {
        let index = self.position(id)?;
        let photo = &mut self.photos[index];
        photo.apply(patch);
        Some(photo)
    }

    pub fn remove(&mut self, id: PhotoId) -> Option<PhotoRecord> {
        let index = self.position(id)?;
        Some(self.photos.remove(index))
    }

    /// Raises the counter and gives its new value to `id`. Unknown ids leave
    /// the counter untouched.
    pub fn bring_to_front(&mut self, id: PhotoId) -> Option<u64> {
        let index = self.position(id)?;
        self.top_z_index += 1;
        self.photos[index].z_index = self.top_z_index;
        Some(self.top_z_index)
    }

    /// Current top value for a photo about to be added; advances the counter.
    pub fn next_z_index(&mut self) -> u64 {
        let z_index = self.top_z_index;
        self.top_z_index += 1;
        z_index
    }

    pub fn top_z_index(&self) -> u64 {
        self.top_z_index
    }

    pub fn get(&self, id: PhotoId) -> Option<&PhotoRecord> {
        self.photos.iter().find(|photo| photo.id == id)
    }

    pub fn contains(&self, id: PhotoId) -> bool {
        self.position(id).is_some()
    }

    pub fn photos(&self) -> &[PhotoRecord] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn topmost(&self) -> Option<&PhotoRecord> {
        self.photos
            .iter()
            .enumerate()
            .max_by_key(|(index, photo)| (photo.z_index, *index))
            .map(|(_, photo)| photo)
    }

    /// Ids from back to front.
    pub fn stacking_order(&self) -> Vec<PhotoId> {
        let mut ordered = self.photos.iter().enumerate().collect::<Vec<_>>();
        ordered.sort_by_key(|(index, photo)| (photo.z_index, *index));
        ordered.into_iter().map(|(_, photo)| photo.id).collect()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
