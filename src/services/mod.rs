pub mod jisho;
pub mod progress;
