use crate::common::{PageId, RecordId, Result, SlotId, StrataError};

/// Heap page layout:
///
/// ```text
/// +---------------------------+
/// | Occupancy bitmap          |  ceil(slots / 8) bytes
/// +---------------------------+
/// | Slot 0                    |  tuple_width bytes
/// | Slot 1                    |
/// | ...                       |
/// | Slot slots - 1            |
/// +---------------------------+
/// | Unused tail               |
/// +---------------------------+
/// ```
///
/// Bit `i % 8` (least significant first) of bitmap byte `i / 8` is set when
/// slot `i` holds a tuple. Every slot costs `tuple_width * 8` bits of data
/// plus one bitmap bit, hence
/// `slots = floor(page_size * 8 / (tuple_width * 8 + 1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapPageLayout {
    page_size: usize,
    tuple_width: usize,
    slots: usize,
}

impl HeapPageLayout {
    pub fn new(page_size: usize, tuple_width: usize) -> Result<Self> {
        if tuple_width == 0 {
            return Err(StrataError::InvalidConfig(
                "tuple width must be non-zero".to_string(),
            ));
        }

        let slots = (page_size * 8) / (tuple_width * 8 + 1);
        if slots == 0 {
            return Err(StrataError::InvalidConfig(format!(
                "a {tuple_width}-byte tuple does not fit in a {page_size}-byte page"
            )));
        }
        if slots > u16::MAX as usize {
            return Err(StrataError::InvalidConfig(format!(
                "{slots} slots per page exceeds the slot id range"
            )));
        }

        Ok(Self {
            page_size,
            tuple_width,
            slots,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn tuple_width(&self) -> usize {
        self.tuple_width
    }

    /// Number of tuple slots per page.
    pub fn slots_per_page(&self) -> usize {
        self.slots
    }

    /// Size of the occupancy bitmap in bytes.
    pub fn header_size(&self) -> usize {
        self.slots.div_ceil(8)
    }

    fn slot_range(&self, slot_id: SlotId) -> std::ops::Range<usize> {
        let start = self.header_size() + slot_id.as_usize() * self.tuple_width;
        start..start + self.tuple_width
    }

    fn check_slot(&self, slot_id: SlotId) -> Result<()> {
        if slot_id.as_usize() >= self.slots {
            return Err(StrataError::InvalidSlotId(slot_id));
        }
        Ok(())
    }

    /// Bytes of a page with every slot free.
    pub fn empty_page_data(&self) -> Vec<u8> {
        vec![0u8; self.page_size]
    }
}

fn slot_used(data: &[u8], slot: usize) -> bool {
    data[slot / 8] & (1 << (slot % 8)) != 0
}

fn set_slot_used(data: &mut [u8], slot: usize, used: bool) {
    if used {
        data[slot / 8] |= 1 << (slot % 8);
    } else {
        data[slot / 8] &= !(1 << (slot % 8));
    }
}

/// Read-only view of a heap page.
pub struct HeapPageRef<'a> {
    data: &'a [u8],
    layout: HeapPageLayout,
}

impl<'a> HeapPageRef<'a> {
    /// Creates a view over `data`, which must be exactly one page long.
    pub fn new(data: &'a [u8], layout: HeapPageLayout) -> Self {
        assert_eq!(data.len(), layout.page_size(), "Buffer must be one page");
        Self { data, layout }
    }

    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        slot_id.as_usize() < self.layout.slots && slot_used(self.data, slot_id.as_usize())
    }

    /// Returns the number of free slots.
    pub fn num_empty_slots(&self) -> usize {
        self.layout.slots - self.tuple_count()
    }

    /// Returns the number of occupied slots.
    pub fn tuple_count(&self) -> usize {
        (0..self.layout.slots)
            .filter(|&slot| slot_used(self.data, slot))
            .count()
    }

    /// Gets a tuple by slot ID.
    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&'a [u8]> {
        self.layout.check_slot(slot_id)?;
        if !slot_used(self.data, slot_id.as_usize()) {
            return Err(StrataError::EmptySlot(slot_id));
        }
        Ok(&self.data[self.layout.slot_range(slot_id)])
    }

    /// Returns the occupied slots in ascending order.
    pub fn occupied_slots(&self) -> impl Iterator<Item = SlotId> + 'a {
        let data = self.data;
        (0..self.layout.slots)
            .filter(move |&slot| slot_used(data, slot))
            .map(|slot| SlotId::new(slot as u16))
    }

    /// Returns every stored tuple with its record ID, in slot order.
    pub fn tuples(&self, page_id: PageId) -> impl Iterator<Item = (RecordId, &'a [u8])> + 'a {
        let data = self.data;
        let layout = self.layout;
        self.occupied_slots().map(move |slot_id| {
            (
                RecordId::new(page_id, slot_id),
                &data[layout.slot_range(slot_id)],
            )
        })
    }
}

/// Mutable view of a heap page.
pub struct HeapPage<'a> {
    data: &'a mut [u8],
    layout: HeapPageLayout,
}

impl<'a> HeapPage<'a> {
    /// Creates a view over `data`, which must be exactly one page long.
    pub fn new(data: &'a mut [u8], layout: HeapPageLayout) -> Self {
        assert_eq!(data.len(), layout.page_size(), "Buffer must be one page");
        Self { data, layout }
    }

    /// Resets every slot to free.
    pub fn init(&mut self) {
        self.data.fill(0);
    }

    /// Returns a read-only view of the same bytes.
    pub fn view(&self) -> HeapPageRef<'_> {
        HeapPageRef {
            data: &*self.data,
            layout: self.layout,
        }
    }

    pub fn num_empty_slots(&self) -> usize {
        self.view().num_empty_slots()
    }

    pub fn tuple_count(&self) -> usize {
        self.view().tuple_count()
    }

    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        self.view().is_slot_used(slot_id)
    }

    /// Writes `tuple` into the first free slot and returns its slot ID.
    pub fn insert_tuple(&mut self, page_id: PageId, tuple: &[u8]) -> Result<SlotId> {
        if tuple.len() != self.layout.tuple_width {
            return Err(StrataError::TupleWidthMismatch {
                expected: self.layout.tuple_width,
                actual: tuple.len(),
            });
        }

        let slot = (0..self.layout.slots)
            .find(|&slot| !slot_used(self.data, slot))
            .ok_or(StrataError::PageFull(page_id))?;
        let slot_id = SlotId::new(slot as u16);

        let range = self.layout.slot_range(slot_id);
        self.data[range].copy_from_slice(tuple);
        set_slot_used(self.data, slot, true);

        Ok(slot_id)
    }

    /// Frees a slot. The slot bytes are zeroed so freed data does not linger
    /// on disk.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        self.layout.check_slot(slot_id)?;
        if !slot_used(self.data, slot_id.as_usize()) {
            return Err(StrataError::EmptySlot(slot_id));
        }

        let range = self.layout.slot_range(slot_id);
        self.data[range].fill(0);
        set_slot_used(self.data, slot_id.as_usize(), false);

        Ok(())
    }
}
