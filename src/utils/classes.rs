use std::{collections::HashMap, hash::Hash};

/// Invert a map by swapping keys and values
pub fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    K: Ord + Hash + Eq,
    V: Ord + Hash + Eq + Clone,
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

/// Build a reverse lookup from an id-ordered list of tokens
pub fn index_tokens<T>(tokens: &[T]) -> HashMap<T, usize>
where
    T: Ord + Hash + Eq + Clone,
{
    invert_map(tokens.iter().cloned().enumerate())
}
