use std::collections::BTreeMap;

/// Merge maps in order; keys in later layers win.
pub fn merge_maps<K, V, I>(layers: I) -> BTreeMap<K, V>
where
    K: Ord,
    I: IntoIterator<Item = BTreeMap<K, V>>,
{
    layers.into_iter().fold(BTreeMap::new(), |mut merged, layer| {
        merged.extend(layer);
        merged
    })
}
