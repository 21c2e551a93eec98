use std::fmt;

use rustc_hash::FxHashMap;

/// Where a context value came from. Later layers take priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Fields exactly as they appear in the dataset row.
    Record,
    /// Canonical fields resolved through the schema.
    Normalized,
    /// Values derived by the enricher.
    Enrichment,
    /// Cross-link HTML fragments.
    Links,
    /// Niche and department globals.
    Globals,
}

/// The values for exactly one rendered page.
///
/// Each key holds one value and the [`Layer`] it was set from. Inserting a
/// key that is already present replaces it only if the new layer is at least
/// as high as the existing one, so the merged result doesn't depend on the
/// order in which layers are added.
#[derive(Clone, Default)]
pub struct PageContext {
    values: FxHashMap<String, (Layer, String)>,
}

impl PageContext {
    pub fn new() -> PageContext {
        PageContext::default()
    }

    pub fn insert<K, V>(&mut self, layer: Layer, key: K, value: V) -> &mut Self
        where K: Into<String>, V: Into<String>
    {
        let key = key.into();
        match self.values.get_mut(&key) {
            Some((existing, _)) if *existing > layer => {}
            Some(slot) => *slot = (layer, value.into()),
            None => {
                self.values.insert(key, (layer, value.into()));
            }
        }

        self
    }

    pub fn extend<I, K, V>(&mut self, layer: Layer, pairs: I) -> &mut Self
        where I: IntoIterator<Item = (K, V)>, K: Into<String>, V: Into<String>
    {
        for (key, value) in pairs {
            self.insert(layer, key, value);
        }

        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|(_, value)| value.as_str())
    }

    pub fn layer(&self, key: &str) -> Option<Layer> {
        self.values.get(key).map(|(layer, _)| *layer)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for PageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.values.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        f.debug_map().entries(entries.into_iter().map(|(k, (_, v))| (k, v))).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_layers_win_in_any_order() {
        let mut forward = PageContext::new();
        forward.insert(Layer::Record, "ville", "albi")
            .insert(Layer::Normalized, "ville", "Albi")
            .insert(Layer::Globals, "domain", "agence.fr");

        let mut backward = PageContext::new();
        backward.insert(Layer::Globals, "domain", "agence.fr")
            .insert(Layer::Normalized, "ville", "Albi")
            .insert(Layer::Record, "ville", "albi");

        for context in [&forward, &backward] {
            assert_eq!(context.get("ville"), Some("Albi"));
            assert_eq!(context.layer("ville"), Some(Layer::Normalized));
            assert_eq!(context.len(), 2);
        }
    }

    #[test]
    fn same_layer_replaces() {
        let mut context = PageContext::new();
        context.extend(Layer::Enrichment, [("nb_avis", "120"), ("nb_avis", "131")]);
        assert_eq!(context.get("nb_avis"), Some("131"));
    }
}
