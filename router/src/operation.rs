use bytes::Bytes;
use http::Method;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AddressError {
    #[error("invalid endpoint address: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme in endpoint address: {0}")]
    UnsupportedScheme(String),

    #[error("endpoint address cannot be used as a base URL")]
    CannotBeABase,
}

/// A query parameter value. `Many` is sent as the same key repeated once per
/// element, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::One(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::One(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::One(value.to_string())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Many(values)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryParams(Vec<(String, QueryValue)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<QueryValue>,
    {
        self.0.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattens the parameters into the key/value pairs sent on the wire.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::with_capacity(self.0.len());
        for (key, value) in &self.0 {
            match value {
                QueryValue::One(v) => pairs.push((key.as_str(), v.as_str())),
                QueryValue::Many(values) => {
                    pairs.extend(values.iter().map(|v| (key.as_str(), v.as_str())))
                }
            }
        }
        pairs
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Multipart body for uploads. Kept as plain data so it can be rebuilt for
/// every endpoint attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Query(QueryParams),
    Multipart(MultipartForm),
}

/// One logical request, dispatched to each endpoint in turn until one succeeds.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub method: Method,
    segments: Vec<String>,
    pub payload: Payload,
    /// Applies to each endpoint attempt separately.
    pub timeout: Duration,
}

impl Operation {
    /// A GET request with query parameters.
    pub fn get(path: &str, timeout: Duration) -> Self {
        Operation {
            method: Method::GET,
            segments: split_path(path),
            payload: Payload::Query(QueryParams::new()),
            timeout,
        }
    }

    /// A POST request with a multipart body.
    pub fn upload(path: &str, form: MultipartForm, timeout: Duration) -> Self {
        Operation {
            method: Method::POST,
            segments: split_path(path),
            payload: Payload::Multipart(form),
            timeout,
        }
    }

    /// Appends a single path segment. The segment is percent-encoded, so it may
    /// contain `/` or spaces.
    pub fn segment<S: Into<String>>(mut self, segment: S) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Adds a query parameter. Has no effect on multipart operations.
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<QueryValue>,
    {
        if let Payload::Query(params) = &mut self.payload {
            params.insert(key, value);
        }
        self
    }

    /// The operation path, for logging.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Joins the operation path onto an endpoint's base address.
    pub fn url_for(&self, address: &str) -> Result<Url, AddressError> {
        let mut url = Url::parse(address)?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AddressError::UnsupportedScheme(url.scheme().to_string()));
        }

        url.path_segments_mut()
            .map_err(|_| AddressError::CannotBeABase)?
            .pop_if_empty()
            .extend(&self.segments);

        Ok(url)
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
