/// Ordered header fields with case-insensitive lookup.
///
/// Used for both WARC record headers and captured HTTP message headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: Vec<(String, String)>,
}

impl HeaderFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl<'h> From<&[httparse::Header<'h>]> for HeaderFields {
    fn from(headers: &[httparse::Header<'h>]) -> Self {
        let mut fields = HeaderFields::new();
        for header in headers {
            fields.insert(
                header.name,
                String::from_utf8_lossy(header.value).trim().to_string(),
            );
        }
        fields
    }
}
