use std::{fmt, io};
use std::panic::Location;
use std::error::Error as StdError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failure raised by some stage of a generation run.
///
/// An error is a stack of _details_, each a message with optional `key: value`
/// context lines, plus an optional _cause_: the lower-level error this one was
/// raised in response to. Errors are built with [`error!`](crate::error!) and
/// wrapped with [`Chainable::chain()`].
#[derive(Debug)]
pub struct Error {
    details: Vec<Box<dyn ErrorDetail>>,
    cause: Option<Box<Error>>,
    location: &'static Location<'static>,
}

pub trait ErrorDetail: fmt::Display + fmt::Debug + Send + Sync {
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }
}

impl Error {
    /// Makes `self` the innermost cause of `outer`, returning `outer`.
    pub fn chain(self, mut outer: Error) -> Self {
        fn attach(cause: Error, to: &mut Error) {
            if let Some(next) = to.cause.as_mut() {
                attach(cause, next);
            } else {
                to.cause = Some(Box::new(cause));
            }
        }

        attach(self, &mut outer);
        outer
    }

    /// Adds another detail to the outermost layer of `self`.
    pub fn with<D: ErrorDetail + 'static>(mut self, detail: D) -> Self {
        self.details.push(Box::new(detail));
        self
    }

    /// The message of the outermost detail.
    pub fn message(&self) -> String {
        self.details.first().map(|d| d.to_string()).unwrap_or_default()
    }

    /// Iterates over `self` and then each of its causes, outermost first.
    pub fn causes(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |e| e.cause.as_deref())
    }

    fn write_nested(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = " ".repeat(depth * 4);
        for detail in &self.details {
            let message = detail.to_string().replace('\n', &format!("\n{pad}"));
            writeln!(f, "{pad}{message}")?;
            for (key, value) in detail.context() {
                match key {
                    Some(key) => writeln!(f, "{pad}  {key}: {value}")?,
                    None => writeln!(f, "{pad}  {value}")?,
                }
            }
        }

        if std::env::var_os("RUST_BACKTRACE").is_some() {
            writeln!(f, "{pad}[{}]", self.location)?;
        }

        match &self.cause {
            Some(cause) => cause.write_nested(f, depth + 1),
            None => Ok(()),
        }
    }
}

impl<T: ErrorDetail + 'static> From<T> for Error {
    #[track_caller]
    fn from(detail: T) -> Self {
        Error {
            details: vec![Box::new(detail)],
            cause: None,
            location: Location::caller(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_nested(f, 0)
    }
}

impl ErrorDetail for &(dyn StdError + Send + Sync) {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut context = vec![];
        let mut source = self.source();
        while let Some(e) = source {
            context.push((None, e.to_string()));
            source = e.source();
        }

        context
    }
}

impl ErrorDetail for Box<dyn StdError + Send + Sync> {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let error: &(dyn StdError + Send + Sync) = &**self;
        error.context()
    }
}

macro_rules! impl_error_detail_with_std_error {
    ($($T:ty),* $(,)?) => {$(
        impl $crate::error::ErrorDetail for $T {
            fn context(&self) -> Vec<(Option<String>, String)> {
                let error: &(dyn std::error::Error + Send + Sync) = self;
                error.context()
            }
        }
    )*}
}

impl_error_detail_with_std_error! {
    io::Error,
    toml::de::Error,
    serde_json::Error,
    csv::Error,
    rayon::ThreadPoolBuildError,
}

impl ErrorDetail for String { }
impl ErrorDetail for &'static str { }

/// A free-form error detail: what [`error!`](crate::error!) builds.
#[derive(Debug)]
pub struct Detail {
    pub message: String,
    pub context: Vec<(Option<String>, String)>,
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl ErrorDetail for Detail {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.context.clone()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! err {
    ($($token:tt)*) => (Err($crate::error!($($token)*)));
}

/// Builds an [`Error`](crate::error::Error) from a message and context.
///
/// ```rust
/// let e = silo::error!("failed to write page", "path" => "alpha/foo.html", 42);
/// let rendered = e.to_string();
/// assert!(rendered.starts_with("failed to write page"));
/// assert!(rendered.contains("path: alpha/foo.html"));
/// assert!(rendered.contains("42"));
/// ```
#[doc(hidden)]
#[macro_export]
macro_rules! error {
    (@context $v:ident $key:expr => $value:expr $(, $($rest:tt)*)?) => {
        $v.push((Some($key.to_string()), $value.to_string()));
        $($crate::error!(@context $v $($rest)*);)?
    };

    (@context $v:ident $value:expr $(, $($rest:tt)*)?) => {
        $v.push((None, $value.to_string()));
        $($crate::error!(@context $v $($rest)*);)?
    };

    (@context $v:ident) => { };

    ($msg:expr $(, $($rest:tt)*)?) => (
        $crate::error::Error::from($crate::error::Detail {
            message: $msg.to_string(),
            context: {
                #[allow(unused_mut)]
                let mut context: Vec<(Option<String>, String)> = Vec::new();
                $($crate::error!(@context context $($rest)*);)?
                context
            },
        })
    );
}

pub trait Chainable<T> {
    fn chain(self, outer: impl Into<Error>) -> Result<T>;

    fn chain_with<F, E>(self, f: F) -> Result<T>
        where F: FnOnce() -> E, E: Into<Error>;
}

impl<T, E: Into<Error>> Chainable<T> for Result<T, E> {
    #[track_caller]
    fn chain(self, outer: impl Into<Error>) -> Result<T> {
        self.map_err(|e| e.into().chain(outer.into()))
    }

    #[track_caller]
    fn chain_with<F, O>(self, f: F) -> Result<T>
        where F: FnOnce() -> O, O: Into<Error>,
    {
        self.map_err(|e| e.into().chain(f().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_errors_nest_causes() {
        let inner: Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone").into());
        let e = inner.chain(error!("failed to read dataset", "path" => "villes.csv"))
            .unwrap_err();

        assert_eq!(e.message(), "failed to read dataset");
        assert_eq!(e.causes().count(), 2);

        let rendered = e.to_string();
        let outer = rendered.find("failed to read dataset").unwrap();
        let inner = rendered.find("    gone").unwrap();
        assert!(outer < inner);
        assert!(rendered.contains("  path: villes.csv"));
    }

    #[test]
    fn extra_details_are_listed() {
        let e = error!("first").with(String::from("second"));
        let rendered = e.to_string();
        assert!(rendered.contains("first\n"));
        assert!(rendered.contains("second\n"));
    }

    static_assertions::assert_impl_all!(Error: Send, Sync);
}
