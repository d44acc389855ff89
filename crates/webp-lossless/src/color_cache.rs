/// Cache of recently used colors, addressed by a multiplicative hash of the color.
#[derive(Debug, Clone)]
pub struct ColorCache {
    bits: u32,
    colors: Vec<u32>,
}

impl ColorCache {
    pub const MAX_BITS: u32 = 11;

    pub fn new(bits: u32) -> Self {
        debug_assert!((1..=Self::MAX_BITS).contains(&bits));
        Self {
            bits,
            colors: vec![0; 1 << bits],
        }
    }

    #[inline]
    fn hash(&self, argb: u32) -> usize {
        (0x1e35a7bdu32.wrapping_mul(argb) >> (32 - self.bits)) as usize
    }

    #[inline]
    pub fn insert(&mut self, argb: u32) {
        let idx = self.hash(argb);
        self.colors[idx] = argb;
    }

    #[inline]
    pub fn get(&self, key: usize) -> Option<u32> {
        self.colors.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut cache = ColorCache::new(4);
        assert_eq!(cache.colors.len(), 16);

        let color = 0xff123456;
        cache.insert(color);
        let key = (0x1e35a7bdu32.wrapping_mul(color) >> 28) as usize;
        assert_eq!(cache.get(key), Some(color));
        assert_eq!(cache.get(16), None);
    }
}
