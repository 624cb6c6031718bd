pub mod kanji;
pub mod progress;
pub mod users;
pub mod words;
