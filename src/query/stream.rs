use std::fmt;
use std::marker::PhantomData;
use std::vec;

use crate::client::{Record, SummarizedResult};
use crate::error::Result;
use crate::model::Model;

use super::mapper::RecordMapper;

/// Forward-only iterator over the entities of one executed statement.
///
/// The whole result is fetched before the stream is handed out; each record
/// is mapped only when it is pulled. The stream cannot be restarted.
pub struct EntityStream<T> {
    records: vec::IntoIter<Record>,
    mapper: RecordMapper,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Model> EntityStream<T> {
    pub(crate) fn new(result: SummarizedResult, mapper: RecordMapper) -> Self {
        Self {
            records: result.into_iter(),
            mapper,
            _marker: PhantomData,
        }
    }

    /// Pulls the first entity, dropping the rest of the stream.
    pub fn first(mut self) -> Result<Option<T>> {
        self.next().transpose()
    }
}

impl<T: Model> Iterator for EntityStream<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(self.mapper.map(&record).map(T::from_entity))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl<T: Model> ExactSizeIterator for EntityStream<T> {}

impl<T> fmt::Debug for EntityStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStream")
            .field("remaining", &self.records.len())
            .field("mapper", &self.mapper)
            .finish()
    }
}
