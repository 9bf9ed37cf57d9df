//! Domain models and their database row mappings.

mod account;
mod media;

pub use self::account::Account;
pub use self::media::Media;

pub(crate) use self::account::AccountRow;
pub(crate) use self::media::MediaRow;
