use std::collections::BTreeSet;

/// Hands out ports from a fixed range.
///
/// Allocation rotates through the range starting after the last port handed
/// out, so a just-released port is the last candidate to be reused.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    base: u16,
    len: usize,
    next: usize,
    allocated: BTreeSet<u16>,
}

impl PortAllocator {
    pub fn new(base: u16, len: usize) -> Self {
        Self {
            base,
            len,
            next: 0,
            allocated: BTreeSet::new(),
        }
    }

    pub fn allocate(&mut self) -> Option<u16> {
        for step in 0..self.len {
            let offset = (self.next + step) % self.len;
            let port = self.base.checked_add(offset as u16)?;
            if self.allocated.insert(port) {
                self.next = (offset + 1) % self.len;
                return Some(port);
            }
        }
        None
    }

    /// Returns false if the port was not allocated
    pub fn release(&mut self, port: u16) -> bool {
        self.allocated.remove(&port)
    }

    pub fn release_all(&mut self) {
        self.allocated.clear();
    }

    pub fn is_allocated(&self, port: u16) -> bool {
        self.allocated.contains(&port)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    pub fn allocated(&self) -> Vec<u16> {
        self.allocated.iter().copied().collect()
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.base && ((port - self.base) as usize) < self.len
    }
}
