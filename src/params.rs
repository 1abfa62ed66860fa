/// Ordered query or form parameters.
///
/// Keys may repeat; insertion order is preserved on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterMap {
    pairs: Vec<(String, String)>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter and returns the map for chaining.
    pub fn add(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// First value recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Encodes the parameters as `application/x-www-form-urlencoded`.
    pub fn url_encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl From<()> for ParameterMap {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for ParameterMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<Vec<(String, String)>> for ParameterMap {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }
}
