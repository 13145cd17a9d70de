pub mod commands;

use serde::{Deserialize, Serialize};

/// One product listing candidate returned by a search.
///
/// `link` is the identity key: comparison and saved membership tests compare
/// offers by link only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub name: String,
    pub store: String,
    /// Display text exactly as the model formatted it (e.g. `"R$ 9.999,00"`).
    pub price: String,
    pub link: String,
    /// Image URL, or an empty string when the model found none.
    #[serde(default)]
    pub image: String,
}

impl Offer {
    pub fn same_listing(&self, other: &Offer) -> bool {
        self.link == other.link
    }

    pub fn has_image(&self) -> bool {
        !self.image.trim().is_empty()
    }
}

/// A web source the model cited as grounding for its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(link: &str) -> Offer {
        Offer {
            name: "Smartwatch NeoPulse".to_string(),
            store: "WearableFuture".to_string(),
            price: "R$ 1.250,00".to_string(),
            link: link.to_string(),
            image: String::new(),
        }
    }

    #[test]
    fn same_listing_compares_links_only() {
        let a = offer("https://loja.com.br/p/1");
        let mut b = offer("https://loja.com.br/p/1");
        b.price = "R$ 999,00".to_string();
        assert!(a.same_listing(&b));
        assert!(!a.same_listing(&offer("https://loja.com.br/p/2")));
    }

    #[test]
    fn offer_serializes_exactly_five_keys() {
        let json = serde_json::to_value(offer("http://a")).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        for key in ["name", "store", "price", "link", "image"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn stored_offer_without_image_defaults_to_empty() {
        let raw = r#"{"name":"X","store":"Y","price":"R$ 10,00","link":"http://a"}"#;
        let parsed: Offer = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.image, "");
        assert!(!parsed.has_image());
    }
}
