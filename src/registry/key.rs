//! Correlation key pairing a request with its later response.

use std::fmt;

/// `(host, url, method)` compared byte for byte.
///
/// No case folding and no trailing-slash normalization: `API.example.com`
/// and `api.example.com` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    host: String,
    url: String,
    method: String,
}

impl CorrelationKey {
    pub fn new(host: &str, url: &str, method: &str) -> Self {
        Self {
            host: host.to_string(),
            url: url.to_string(),
            method: method.to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.method, self.url, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_equal_inputs_equal_keys() {
        let a = CorrelationKey::new("api.example.com", "https://api.example.com/graphql", "POST");
        let b = CorrelationKey::new("api.example.com", "https://api.example.com/graphql", "POST");
        assert_eq!(a, b);

        let mut index = HashMap::new();
        index.insert(a, 7usize);
        assert_eq!(index.get(&b), Some(&7));
    }

    #[test]
    fn test_no_normalization() {
        let base = CorrelationKey::new("api.example.com", "https://api.example.com/graphql", "POST");
        assert_ne!(
            base,
            CorrelationKey::new("API.example.com", "https://api.example.com/graphql", "POST")
        );
        assert_ne!(
            base,
            CorrelationKey::new("api.example.com", "https://api.example.com/graphql/", "POST")
        );
        assert_ne!(
            base,
            CorrelationKey::new("api.example.com", "https://api.example.com/graphql", "post")
        );
    }
}
