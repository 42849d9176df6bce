use thiserror::Error;

/// Failures of the shared TLS setup.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Tls(#[from] rustls::Error),

    /// The platform trust store yielded no usable certificate.
    #[error("no usable root certificates in the platform trust store")]
    NoRootCertificates,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error types buildable from a bare message; required by [`impl_context!`].
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Expands to a `Context` trait adding `.context()` and `.with_context()` to
/// `Result` and `Option`, producing the calling module's `Error`.
///
/// The calling module must define `Error: FromMessage` and a `Result<T>`
/// alias, as `tandem-config` does.
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let ctx = context.into();
                self.map_err(|source| {
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|source| {
                    let ctx = f().into();
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(context.into()))
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}
