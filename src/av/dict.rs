use bitflags::bitflags;

bitflags! {
    /// Lookup and insertion behaviour for [`Dictionary`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DictFlags: u32 {
        /// Compare keys case-insensitively.
        const IGNORE_CASE = 1 << 0;
        /// Match any key that starts with the requested one.
        const IGNORE_SUFFIX = 1 << 1;
        /// Keep the existing value if the key is present.
        const DONT_OVERWRITE = 1 << 4;
        /// Join onto the existing value with a comma.
        const APPEND = 1 << 5;
        /// Add a new entry even if the key exists.
        const MULTIKEY = 1 << 6;
    }
}

/// A single key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictEntry {
    /// Entry key.
    pub key: String,
    /// Entry value.
    pub value: String,
}

/// Ordered string metadata attached to frames and side data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<DictEntry>,
}

fn key_matches(candidate: &str, key: &str, flags: DictFlags) -> bool {
    let prefix_only = flags.contains(DictFlags::IGNORE_SUFFIX);
    if flags.contains(DictFlags::IGNORE_CASE) {
        let candidate = candidate.to_lowercase();
        let key = key.to_lowercase();
        if prefix_only {
            candidate.starts_with(&key)
        } else {
            candidate == key
        }
    } else if prefix_only {
        candidate.starts_with(key)
    } else {
        candidate == key
    }
}

impl Dictionary {
    /// An empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, counting repeated keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DictEntry> {
        self.entries.iter()
    }

    /// First entry matching `key`.
    pub fn get(&self, key: &str, flags: DictFlags) -> Option<&DictEntry> {
        self.position(key, 0, flags).map(|i| &self.entries[i])
    }

    /// Next match strictly after position `prev`, for walking multi-keys.
    pub fn get_after(&self, key: &str, prev: usize, flags: DictFlags) -> Option<(usize, &DictEntry)> {
        self.position(key, prev + 1, flags).map(|i| (i, &self.entries[i]))
    }

    /// Value of the first entry whose key equals `key` exactly.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key, DictFlags::empty()).map(|e| e.value.as_str())
    }

    fn position(&self, key: &str, start: usize, flags: DictFlags) -> Option<usize> {
        if key.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, e)| key_matches(&e.key, key, flags))
            .map(|(i, _)| i)
    }

    /// Inserts, replaces, appends to or removes an entry.
    ///
    /// A `None` value removes the first entry matching `key`.
    pub fn set(&mut self, key: &str, value: Option<&str>, flags: DictFlags) {
        let existing = if flags.contains(DictFlags::MULTIKEY) {
            None
        } else {
            // Prefix matching is a lookup concern only
            self.position(key, 0, flags - DictFlags::IGNORE_SUFFIX)
        };

        let Some(value) = value else {
            if let Some(i) = existing.or_else(|| self.position(key, 0, flags - DictFlags::IGNORE_SUFFIX)) {
                self.entries.remove(i);
            }
            return;
        };

        match existing {
            Some(i) => {
                if flags.contains(DictFlags::DONT_OVERWRITE) {
                    return;
                }
                let entry = &mut self.entries[i];
                if flags.contains(DictFlags::APPEND) {
                    entry.value.push(',');
                    entry.value.push_str(value);
                } else {
                    entry.value = value.to_string();
                }
            }
            None => self.entries.push(DictEntry {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Sets every entry of `src` into `self` with `flags`.
    pub fn copy_from(&mut self, src: &Dictionary, flags: DictFlags) {
        for entry in &src.entries {
            self.set(&entry.key, Some(&entry.value), flags);
        }
    }

    /// Removes every entry, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = &'a DictEntry;
    type IntoIter = std::slice::Iter<'a, DictEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_case_handling() {
        let mut dict = Dictionary::new();
        dict.set("Title", Some("intro"), DictFlags::empty());

        assert_eq!(dict.value("Title"), Some("intro"));
        assert_eq!(dict.value("title"), None);
        assert!(dict.get("title", DictFlags::IGNORE_CASE).is_some());

        dict.set("TITLE", Some("outro"), DictFlags::IGNORE_CASE);
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.value("Title"), Some("outro"));
    }

    #[test]
    fn test_set_variants() {
        let mut dict = Dictionary::new();
        dict.set("lang", Some("en"), DictFlags::empty());
        dict.set("lang", Some("fr"), DictFlags::empty());
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.value("lang"), Some("fr"));

        dict.set("lang", Some("de"), DictFlags::DONT_OVERWRITE);
        assert_eq!(dict.value("lang"), Some("fr"));

        dict.set("lang", Some("de"), DictFlags::APPEND);
        assert_eq!(dict.value("lang"), Some("fr,de"));

        dict.set("lang", Some("it"), DictFlags::MULTIKEY);
        assert_eq!(dict.len(), 2);
        let (pos, second) = dict.get_after("lang", 0, DictFlags::empty()).unwrap();
        assert_eq!((pos, second.value.as_str()), (1, "it"));

        dict.set("lang", None, DictFlags::empty());
        assert_eq!(dict.value("lang"), Some("it"));
    }

    #[test]
    fn test_prefix_lookup_and_copy() {
        let mut src = Dictionary::new();
        src.set("creation_time", Some("2024"), DictFlags::empty());
        src.set("encoder", Some("x"), DictFlags::empty());
        assert_eq!(
            src.get("creation", DictFlags::IGNORE_SUFFIX).map(|e| e.key.as_str()),
            Some("creation_time")
        );
        assert!(src.get("creation", DictFlags::empty()).is_none());
        assert!(src.get("", DictFlags::IGNORE_SUFFIX).is_none());

        let mut dst = Dictionary::new();
        dst.set("encoder", Some("y"), DictFlags::empty());
        dst.copy_from(&src, DictFlags::DONT_OVERWRITE);
        assert_eq!(dst.len(), 2);
        assert_eq!(dst.value("encoder"), Some("y"));
        assert_eq!(
            dst.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(),
            vec!["encoder", "creation_time"]
        );
    }
}
