use serde::{Deserialize, Serialize};

/// One candidate server. Lists of endpoints are replaced wholesale, never patched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EndpointRecord")]
pub struct Endpoint {
    /// Base URL of the server, e.g. `http://10.0.0.5:8080`.
    #[serde(rename = "url")]
    pub address: String,
    /// Lower values are tried first.
    pub priority: i64,
    #[serde(rename = "name")]
    pub display_name: String,
    pub description: String,
}

// Records may name the base URL `url`, `address`, or both. `url` wins.
#[derive(Deserialize)]
struct EndpointRecord {
    url: Option<String>,
    address: Option<String>,
    priority: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

impl TryFrom<EndpointRecord> for Endpoint {
    type Error = &'static str;

    fn try_from(record: EndpointRecord) -> Result<Self, Self::Error> {
        let address = record
            .url
            .or(record.address)
            .ok_or("endpoint record has neither `url` nor `address`")?;

        Ok(Endpoint {
            address,
            priority: record.priority,
            display_name: record.name,
            description: record.description,
        })
    }
}

impl Endpoint {
    pub fn new<A, N, D>(address: A, priority: i64, display_name: N, description: D) -> Self
    where
        A: Into<String>,
        N: Into<String>,
        D: Into<String>,
    {
        Endpoint {
            address: address.into(),
            priority,
            display_name: display_name.into(),
            description: description.into(),
        }
    }
}

/// Sorts by ascending priority. The sort is stable so endpoints sharing a
/// priority keep their list order.
pub fn sort_by_priority(endpoints: &mut [Endpoint]) {
    endpoints.sort_by_key(|e| e.priority);
}

/// Built-in list used whenever nothing usable has been persisted.
pub fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new(
            "http://localhost:8080",
            1,
            "Primary server",
            "Primary data processing server",
        ),
        Endpoint::new(
            "http://localhost:8081",
            2,
            "Backup server 1",
            "First backup server",
        ),
        Endpoint::new(
            "http://localhost:8082",
            3,
            "Backup server 2",
            "Second backup server",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_aliases_and_defaults() {
        let endpoints: Vec<Endpoint> = serde_json::from_value(json!([
            {"url": "http://a:1", "priority": 2, "name": "A"},
            {"address": "http://b:1", "priority": 1},
        ]))
        .unwrap();

        assert_eq!(endpoints[0], Endpoint::new("http://a:1", 2, "A", ""));
        assert_eq!(endpoints[1], Endpoint::new("http://b:1", 1, "", ""));
    }

    #[test]
    fn test_url_preferred_over_address() {
        let endpoint: Endpoint = serde_json::from_value(json!(
            {"url": "http://a:1", "address": "http://other:1", "priority": 1}
        ))
        .unwrap();

        assert_eq!(endpoint.address, "http://a:1");
    }

    #[test]
    fn test_missing_required_fields() {
        assert!(serde_json::from_value::<Endpoint>(json!({"url": "http://a:1"})).is_err());
        assert!(serde_json::from_value::<Endpoint>(json!({"priority": 1})).is_err());
        assert!(
            serde_json::from_value::<Endpoint>(json!({"url": null, "priority": 1})).is_err()
        );
        assert!(
            serde_json::from_value::<Endpoint>(json!({"url": "http://a:1", "priority": "1"}))
                .is_err()
        );
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let value = serde_json::to_value(Endpoint::new("http://a:1", 1, "A", "d")).unwrap();
        assert_eq!(
            value,
            json!({"url": "http://a:1", "priority": 1, "name": "A", "description": "d"})
        );
    }

    #[test]
    fn test_sort_is_stable() {
        let mut endpoints = vec![
            Endpoint::new("c", 3, "", ""),
            Endpoint::new("a1", 1, "", ""),
            Endpoint::new("b", 2, "", ""),
            Endpoint::new("a2", 1, "", ""),
        ];
        sort_by_priority(&mut endpoints);

        let order: Vec<&str> = endpoints.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(order, ["a1", "a2", "b", "c"]);
    }

    #[test]
    fn test_default_endpoints() {
        let defaults = default_endpoints();
        assert_eq!(defaults.len(), 3);
        assert_eq!(defaults[0].address, "http://localhost:8080");
        assert_eq!(defaults[2].address, "http://localhost:8082");
        assert_eq!(
            defaults.iter().map(|e| e.priority).collect::<Vec<_>>(),
            [1, 2, 3]
        );
    }
}
