/// The global matrix profile assembled from tiles.
///
/// `profile[i]` is the smallest distance merged so far at global position `i`
/// and `profile_index[i]` the global index of the neighbor that produced it.
/// The two arrays are only ever written together.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalProfile {
    /// Nearest-neighbor distances; `+inf` where no tile has contributed.
    pub profile: Vec<f64>,
    /// Index of the nearest neighbor in global coordinates.
    pub profile_index: Vec<usize>,
}

impl GlobalProfile {
    /// Create a profile of length `len` initialized to infinity distances.
    pub fn new(len: usize) -> Self {
        Self {
            profile: vec![f64::INFINITY; len],
            profile_index: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.profile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_empty()
    }

    /// Fold a tile-local profile segment into positions `start..start + distances.len()`.
    ///
    /// `indices` are tile-local; `index_offset` is added to each before it is
    /// stored. Returns the number of positions that improved. The caller
    /// guarantees the segment fits inside the profile.
    pub fn fold(
        &mut self,
        start: usize,
        distances: &[f64],
        indices: &[usize],
        index_offset: usize,
    ) -> usize {
        debug_assert_eq!(distances.len(), indices.len());
        debug_assert!(start + distances.len() <= self.len());

        let dst_profile = &mut self.profile[start..start + distances.len()];
        let dst_index = &mut self.profile_index[start..start + distances.len()];
        let mut improved = 0;
        for (p, (&d, &nn)) in distances.iter().zip(indices).enumerate() {
            if d < dst_profile[p] {
                dst_profile[p] = d;
                dst_index[p] = nn + index_offset;
                improved += 1;
            }
        }
        improved
    }

    /// Number of positions no contribution has reached.
    pub fn uncovered(&self) -> usize {
        self.profile.iter().filter(|d| d.is_infinite()).count()
    }
}
