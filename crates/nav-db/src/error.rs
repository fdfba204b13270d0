use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row no longer decodes into the domain model.
    #[error("corrupt {table} row '{key}': {detail}")]
    Corrupt {
        table: &'static str,
        key: String,
        detail: String,
    },

    #[error("invalid store input: {0}")]
    Invalid(String),
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, key: impl Into<String>, detail: impl ToString) -> Self {
        StoreError::Corrupt {
            table,
            key: key.into(),
            detail: detail.to_string(),
        }
    }
}
