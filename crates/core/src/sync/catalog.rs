use std::cmp::Ordering;

use crate::sync::domain::annotation_store::{AnnotationStore, StoreError};

/// Workers and movies known to the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    pub workers: Vec<String>,
    pub movies: Vec<String>,
}

impl Catalog {
    pub fn fetch(store: &dyn AnnotationStore) -> Result<Self, StoreError> {
        let workers = store.worker_list()?;
        let movies = store.movie_list()?;
        log::debug!(
            "Catalog: {} workers, {} movies",
            workers.len(),
            movies.len()
        );
        Ok(Self { workers, movies })
    }

    /// Annotators of `movie`, ordered for picking a reference.
    pub fn references_for_movie(
        &self,
        store: &dyn AnnotationStore,
        movie: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut references = store.workers_for_movie(movie)?;
        sort_references(&mut references, &self.workers);
        Ok(references)
    }
}

/// Names that are not regular workers (e.g. ground-truth tracks) come first;
/// each group is ordered case-insensitively.
pub fn sort_references(references: &mut [String], known_workers: &[String]) {
    references.sort_by(|a, b| {
        let a_known = known_workers.contains(a);
        let b_known = known_workers.contains(b);
        match (a_known, b_known) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => a.to_lowercase().cmp(&b.to_lowercase()),
        }
    });
}
