//! Key-space layout for one namespace.
//!
//! Every key lives under a caller-supplied prefix and uses `:` as separator:
//!
//! ```text
//! <prefix>:bloom            filter bit array (one per namespace)
//! <prefix>:request:<id>     exact-match visited marker
//! <prefix>:cookie:<host>    cookie jar for one host
//! <prefix>:queue            FIFO request queue
//! ```
//!
//! The filter key and the exact-match keys are separate so either can be
//! deleted without touching the other.

/// Escapes the glob metacharacters `*?[]\` so `text` matches only itself.
fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Derives the keys of one namespace.
///
/// Keys are built from the prefix literally; only the patterns used to list a
/// namespace escape it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Creates a key space for `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Returns the namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the filter's bit array.
    pub fn bloom(&self) -> String {
        format!("{}:bloom", self.prefix)
    }

    /// Key of an exact-match visited marker.
    pub fn request(&self, id: u64) -> String {
        format!("{}:request:{}", self.prefix, id)
    }

    /// Pattern matching every visited marker.
    pub fn request_pattern(&self) -> String {
        format!("{}:request:*", escape_glob(&self.prefix))
    }

    /// Key of a host's cookie jar.
    pub fn cookie(&self, host: &str) -> String {
        format!("{}:cookie:{}", self.prefix, host)
    }

    /// Pattern matching every cookie jar.
    pub fn cookie_pattern(&self) -> String {
        format!("{}:cookie:*", escape_glob(&self.prefix))
    }

    /// Key of the request queue.
    pub fn queue(&self) -> String {
        format!("{}:queue", self.prefix)
    }
}
