/// Evaluates the tokens, logging how long they took at `debug` level.
#[doc(hidden)]
#[macro_export]
macro_rules! time {
    ($stage:literal, $($token:tt)*) => ({
        let start = std::time::Instant::now();
        let value = { $($token)* };
        $crate::tracing::debug!(stage = $stage, elapsed_ms = start.elapsed().as_millis() as u64, "stage complete");
        value
    });
}

/// Builds a `Vec<(&'static str, String)>` of context pairs.
#[doc(hidden)]
#[macro_export]
macro_rules! pairs {
    ($($key:expr => $value:expr),* $(,)?) => ({
        #[allow(unused_mut)]
        let mut pairs: Vec<(&'static str, String)> = Vec::new();
        $(pairs.push(($key, $value.to_string()));)*
        pairs
    });
}

pub use {time, pairs};
