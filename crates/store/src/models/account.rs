/// A creator account that media records belong to.
///
/// Only a stub of the upstream account object; the id and display name are
/// all the resolver needs for attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub id: i64,
    pub username: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self { id: row.id, username: row.username }
    }
}
