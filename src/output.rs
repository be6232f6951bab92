use std::io::{self, Write};

use serde::Serialize;

use crate::domain::{DerivedRow, Selection};

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub rows: usize,
    pub countries: usize,
    pub snapshot_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult<'a> {
    pub selection: &'a Selection,
    pub rows: &'a [DerivedRow],
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_refresh(result: &RefreshResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_names(names: &[String]) -> io::Result<()> {
        Self::print_json(&names)
    }

    pub fn print_query(result: &QueryResult<'_>) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
