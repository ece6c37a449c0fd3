use crate::common::RecordId;

/// A single row as stored in a heap file.
///
/// The storage core treats the bytes as opaque: only their length (the
/// table's fixed tuple width) matters. Encoding column values is the job of
/// the schema layer above.
///
/// A tuple read from a heap file carries the `RecordId` of the slot it came
/// from; deleting a tuple requires one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    data: Vec<u8>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple that has not been stored anywhere yet.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            record_id: None,
        }
    }

    /// Creates a tuple located at `record_id`.
    pub fn with_record_id(data: impl Into<Vec<u8>>, record_id: RecordId) -> Self {
        Self {
            data: data.into(),
            record_id: Some(record_id),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PageId, SlotId, TableId};

    #[test]
    fn test_tuple_record_id() {
        let mut tuple = Tuple::new(vec![1, 2, 3]);
        assert_eq!(tuple.len(), 3);
        assert_eq!(tuple.record_id(), None);

        let rid = RecordId::new(PageId::new(TableId::new(1), 4), SlotId::new(2));
        tuple.set_record_id(Some(rid));
        assert_eq!(tuple.record_id(), Some(rid));
        assert_eq!(Tuple::with_record_id(vec![1, 2, 3], rid), tuple);
    }
}
