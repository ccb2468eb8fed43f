use crate::models::Properties;
use log::debug;

const MAX_PROPERTY_KEY_LEN: usize = 150;
const MAX_PROPERTY_VALUE_LEN: usize = 8192;

pub(crate) trait Sanitize {
    fn sanitize(&mut self);
}

/// Truncate `value` to at most `max` characters.
pub(crate) fn truncate_chars(value: &mut String, max: usize) {
    if let Some((idx, _)) = value.char_indices().nth(max) {
        value.truncate(idx);
    }
}

impl Sanitize for Properties {
    fn sanitize(&mut self) {
        let long_keys: Vec<_> = self
            .keys()
            .filter(|k| k.chars().count() > MAX_PROPERTY_KEY_LEN)
            .cloned()
            .collect();
        for long_key in long_keys {
            if let Some(value) = self.remove(&long_key) {
                let mut key = long_key;
                truncate_chars(&mut key, MAX_PROPERTY_KEY_LEN);
                if self.insert(key.clone(), value).is_some() {
                    debug!(
                        "Truncated property name overrides property with the same name: {}",
                        key
                    );
                }
            }
        }
        for value in self.values_mut() {
            truncate_chars(value, MAX_PROPERTY_VALUE_LEN);
        }
    }
}

impl<T: Sanitize> Sanitize for Option<T> {
    fn sanitize(&mut self) {
        if let Some(inner) = self.as_mut() {
            inner.sanitize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::FromIterator;

    #[test]
    fn sanitize_properties() {
        let mut properties = Properties::from_iter(vec![
            // Long value
            ("1".repeat(1), "v".repeat(8200)),
            // Long key and long value
            ("2".repeat(160), "v".repeat(8200)),
            // Long key
            ("3".repeat(160), "v".repeat(1)),
            // Long key collides with and replaces other key
            ("4".repeat(150), "x".repeat(1)),
            ("4".repeat(160), "y".repeat(1)),
        ]);
        properties.sanitize();
        assert_eq!(4, properties.len());
        assert_eq!(8192, properties.get("1").unwrap().len());
        assert_eq!(8192, properties.get(&"2".repeat(150)).unwrap().len());
        assert_eq!(1, properties.get(&"3".repeat(150)).unwrap().len());
        assert_eq!("y", properties.get(&"4".repeat(150)).unwrap());
    }

    #[test]
    fn truncates_on_char_boundary() {
        let mut value = "äöü".to_string();
        truncate_chars(&mut value, 2);
        assert_eq!("äö", value);
        truncate_chars(&mut value, 10);
        assert_eq!("äö", value);
    }
}
