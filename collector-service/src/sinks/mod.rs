pub mod csv_appender;

pub use csv_appender::{AppendOutcome, CsvAppender, SinkError};
