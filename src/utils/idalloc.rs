use bitvec::vec::BitVec;

/// Dense slot allocator over a growable bitmap.
///
/// Always returns the lowest free slot, so indices handed to shaders stay
/// dense and table capacity is used front-to-back.
#[derive(Default)]
pub struct IdAlloc {
    bits: BitVec,
}

impl IdAlloc {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
        }
    }
    pub fn alloc_one(&mut self) -> u32 {
        if let Some(index) = self.bits.first_zero() {
            self.bits.set(index, true);
            return index as u32;
        }
        let index = self.bits.len();
        self.bits.push(true);
        index as u32
    }
    pub fn free(&mut self, id: u32) {
        self.bits.set(id as usize, false);
    }
    pub fn is_allocated(&self, id: u32) -> bool {
        self.bits.get(id as usize).map(|bit| *bit).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_alloc() {
        let mut alloc = IdAlloc::new();
        assert_eq!(alloc.alloc_one(), 0);
        assert_eq!(alloc.alloc_one(), 1);
        assert_eq!(alloc.alloc_one(), 2);
    }

    #[test]
    fn test_reuses_lowest_freed_slot() {
        let mut alloc = IdAlloc::new();
        for _ in 0..4 {
            alloc.alloc_one();
        }
        alloc.free(1);
        alloc.free(3);
        assert_eq!(alloc.alloc_one(), 1);
        assert_eq!(alloc.alloc_one(), 3);
        assert_eq!(alloc.alloc_one(), 4);
    }

    #[test]
    fn test_is_allocated() {
        let mut alloc = IdAlloc::new();
        let id = alloc.alloc_one();
        assert!(alloc.is_allocated(id));
        alloc.free(id);
        assert!(!alloc.is_allocated(id));
        assert!(!alloc.is_allocated(100));
    }
}
