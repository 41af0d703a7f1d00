use thiserror::Error;

/// Errors that can occur when converting a handle with a runtime type check.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The handle to convert did not own a value, so there was nothing to check.
    #[error("cannot cast an empty handle to {target}")]
    EmptySource {
        /// Name of the type the caller asked for.
        target: &'static str,
    },

    /// The value owned by the handle is not of the requested type.
    #[error("value viewed as {view} does not have type {target}")]
    TypeMismatch {
        /// Name of the type the handle viewed the value as.
        view: &'static str,

        /// Name of the type the caller asked for.
        target: &'static str,
    },
}

/// A specialized `Result` type for cast operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn messages_name_the_types() {
        let empty = Error::EmptySource { target: "u32" };
        assert_eq!(empty.to_string(), "cannot cast an empty handle to u32");

        let mismatch = Error::TypeMismatch {
            view: "dyn core::any::Any",
            target: "alloc::string::String",
        };
        assert_eq!(
            mismatch.to_string(),
            "value viewed as dyn core::any::Any does not have type alloc::string::String"
        );
    }
}
