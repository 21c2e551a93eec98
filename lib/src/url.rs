use std::fmt;

use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};

/// An owned URL or URL path: a page's canonical location.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, Deref, From)]
#[serde(transparent)]
pub struct UrlBuf(String);

impl UrlBuf {
    pub fn new() -> UrlBuf {
        UrlBuf(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The scheme of `self`, if it is an absolute URL.
    ///
    /// ```rust
    /// use silo::url::UrlBuf;
    ///
    /// assert_eq!(UrlBuf::from("https://sites-sante.fr/").scheme(), Some("https"));
    /// assert_eq!(UrlBuf::from("/alpha/foo").scheme(), None);
    /// assert_eq!(UrlBuf::from("1https://x").scheme(), None);
    /// ```
    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once("://")?;
        let mut chars = scheme.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

        valid.then_some(scheme)
    }

    /// The path component of `self`: everything after the authority for
    /// absolute URLs, or all of `self` otherwise.
    ///
    /// ```rust
    /// use silo::url::UrlBuf;
    ///
    /// assert_eq!(UrlBuf::from("https://agence.fr/alpha/foo").path(), "/alpha/foo");
    /// assert_eq!(UrlBuf::from("https://agence.fr").path(), "/");
    /// assert_eq!(UrlBuf::from("alpha/foo").path(), "alpha/foo");
    /// ```
    pub fn path(&self) -> &str {
        match self.scheme() {
            Some(scheme) => {
                let rest = &self.0[scheme.len() + 3..];
                match rest.find('/') {
                    Some(i) => &rest[i..],
                    None => "/",
                }
            }
            None => &self.0,
        }
    }

    /// ```rust
    /// use silo::url::UrlBuf;
    ///
    /// let mut url = UrlBuf::from("https://agence-web-locale.fr");
    /// url.append("alpha");
    /// assert_eq!(url.as_str(), "https://agence-web-locale.fr/alpha");
    ///
    /// url.append("/creation-site-internet-foo");
    /// assert_eq!(url.as_str(), "https://agence-web-locale.fr/alpha/creation-site-internet-foo");
    ///
    /// url.append("https://sites-sante.fr/sante/");
    /// assert_eq!(url.as_str(), "https://sites-sante.fr/sante/");
    ///
    /// let mut url = UrlBuf::from("/departement/");
    /// url.append("/alpha/");
    /// assert_eq!(url.as_str(), "/departement/alpha/");
    /// ```
    pub fn append<T: AsRef<str>>(&mut self, url: T) -> &mut Self {
        let url = url.as_ref();
        if UrlBuf::from(url).scheme().is_some() {
            self.0 = url.to_owned();
        } else if self.0.is_empty() {
            self.0.push_str(url);
        } else {
            match (self.0.ends_with('/'), url.starts_with('/')) {
                (true, true) => self.0.push_str(&url[1..]),
                (true, false) | (false, true) => self.0.push_str(url),
                (false, false) => {
                    self.0.push('/');
                    self.0.push_str(url);
                }
            }
        }

        self
    }

    pub fn join<T: AsRef<str>>(&self, url: T) -> UrlBuf {
        let mut joined = self.clone();
        joined.append(url);
        joined
    }

    pub fn make_absolute(&mut self) -> &mut Self {
        if self.scheme().is_none() && !self.0.starts_with('/') {
            self.0.insert(0, '/');
        }

        self
    }
}

impl From<&str> for UrlBuf {
    fn from(value: &str) -> Self {
        UrlBuf(value.to_owned())
    }
}

impl AsRef<str> for UrlBuf {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
