use thiserror::Error;

/// Fatal configuration problems. Surfaced synchronously to the caller of
/// the triggering operation; never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("plugin `{0}` is not registered")]
    NotRegistered(String),

    #[error("plugin alias recursion detected")]
    AliasRecursion,

    #[error("missing required option `{option}`")]
    MissingOption { option: String },

    #[error("options must serialize to a map")]
    NotAMap,

    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),

    #[error("ron parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// A bind key that cannot be wired up. Fatal to that bind call only.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("malformed bind key `{0}`")]
    MalformedKey(String),

    #[error("cannot bind `{key}`: `{segment}` does not resolve to a bindable target")]
    Unresolved { key: String, segment: String },
}
