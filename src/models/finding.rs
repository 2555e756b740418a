use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::errors::AltscoutError;

/// An image on a page that has no alternate text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Image source URL as rendered on the page.
    pub src: String,
    /// Attachment name shown to readers.
    pub name: String,
}

/// Ordered mapping of image reference to display name.
///
/// Persisted as a JSON array so that order survives the round trip through
/// the store. Inserting an existing `src` replaces its name in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageMap(Vec<ImageRef>);

impl ImageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: impl Into<String>, name: impl Into<String>) {
        let src = src.into();
        let name = name.into();
        match self.0.iter_mut().find(|r| r.src == src) {
            Some(existing) => existing.name = name,
            None => self.0.push(ImageRef { src, name }),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRef> {
        self.0.iter()
    }

    pub fn to_json(&self) -> Result<String, AltscoutError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, AltscoutError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl<S: Into<String>, N: Into<String>> FromIterator<(S, N)> for ImageMap {
    fn from_iter<I: IntoIterator<Item = (S, N)>>(iter: I) -> Self {
        let mut map = ImageMap::new();
        for (src, name) in iter {
            map.insert(src, name);
        }
        map
    }
}

/// A page that currently has at least one image without alternate text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub page_id: String,
    pub title: String,
    pub images: ImageMap,
}

/// How long a finding has been outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessRecord {
    pub page_id: String,
    pub last_checked: NaiveDate,
    pub cumulative_stale_days: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_map_preserves_insertion_order() {
        let map: ImageMap = [("b.png", "B"), ("a.png", "A"), ("c.png", "C")].into_iter().collect();
        let srcs: Vec<&str> = map.iter().map(|r| r.src.as_str()).collect();
        assert_eq!(srcs, vec!["b.png", "a.png", "c.png"]);
    }

    #[test]
    fn test_image_map_insert_existing_replaces_name() {
        let mut map = ImageMap::new();
        map.insert("a.png", "first");
        map.insert("b.png", "other");
        map.insert("a.png", "second");
        assert_eq!(map.len(), 2);
        let first = map.iter().next().unwrap();
        assert_eq!(first.src, "a.png");
        assert_eq!(first.name, "second");
    }

    #[test]
    fn test_image_map_json_shape() {
        let map: ImageMap = [("https://wiki/img.png", "diagram.png")].into_iter().collect();
        let json = map.to_json().unwrap();
        assert_eq!(json, r#"[{"src":"https://wiki/img.png","name":"diagram.png"}]"#);
        assert_eq!(ImageMap::from_json(&json).unwrap(), map);
    }

    #[test]
    fn test_image_map_rejects_legacy_text() {
        assert!(ImageMap::from_json("{'a.png': 'A'}").is_err());
    }
}
