use hashbrown::HashMap;
use memchr::memmem;

/// Gram width used to bucket haystack positions.
pub const SUFFIX_DEPTH: usize = 5;

/// Substring search over a large, fixed haystack.
///
/// Every containment probe against a big request body would otherwise be a
/// linear scan. The index buckets each position of the haystack by the
/// [`SUFFIX_DEPTH`]-byte gram starting there, so a probe only compares the
/// needle at positions where its first gram already matches. Needles shorter
/// than a gram fall back to a plain scan.
#[derive(Debug)]
pub struct SuffixIndex {
    text: Box<str>,
    grams: HashMap<[u8; SUFFIX_DEPTH], Vec<u32>>,
}

impl SuffixIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut grams: HashMap<[u8; SUFFIX_DEPTH], Vec<u32>> = HashMap::default();

        for (pos, window) in text.as_bytes().windows(SUFFIX_DEPTH).enumerate() {
            let mut key = [0u8; SUFFIX_DEPTH];

            key.copy_from_slice(window);

            // Positions fit in u32: request data is orders of magnitude
            // smaller.
            grams.entry(key).or_default().push(pos as u32);
        }

        SuffixIndex {
            text: text.into(),
            grams,
        }
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.as_bytes();
        let hay = self.text.as_bytes();

        if needle.is_empty() {
            return true;
        }

        if needle.len() < SUFFIX_DEPTH {
            return memmem::find(hay, needle).is_some();
        }

        let mut key = [0u8; SUFFIX_DEPTH];

        key.copy_from_slice(&needle[..SUFFIX_DEPTH]);

        match self.grams.get(&key) {
            Some(positions) => positions.iter().any(|&pos| {
                let pos = pos as usize;

                hay.len() - pos >= needle.len() && &hay[pos..pos + needle.len()] == needle
            }),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_substrings() {
        let idx = SuffixIndex::new("the quick brown fox jumps over the lazy dog");

        assert!(idx.contains("quick brown"));
        assert!(idx.contains("the lazy dog"));
        assert!(idx.contains(""));
        assert!(!idx.contains("quick red"));
        assert!(!idx.contains("doggo"));
    }

    #[test]
    fn short_needles_fall_back_to_linear_scan() {
        let idx = SuffixIndex::new("abcdefgh");

        assert!(idx.contains("a"));
        assert!(idx.contains("fgh"));
        assert!(!idx.contains("xy"));
    }

    #[test]
    fn agrees_with_linear_search() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        let hay: String = (0..2000)
            .map(|_| char::from(rng.gen_range(b'a'..=b'd')))
            .collect();
        let idx = SuffixIndex::new(&hay);

        for _ in 0..500 {
            let len = rng.gen_range(1..12);
            let needle: String = (0..len)
                .map(|_| char::from(rng.gen_range(b'a'..=b'd')))
                .collect();

            assert_eq!(
                idx.contains(&needle),
                memmem::find(hay.as_bytes(), needle.as_bytes()).is_some(),
                "disagreement for {needle:?}"
            );
        }
    }
}
