pub mod sheets;
pub mod token;

pub use sheets::GoogleSheetsAdapter;
pub use token::ServiceAccountTokens;
