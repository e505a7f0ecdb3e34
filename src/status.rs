use crate::error::ScrapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStatus {
    pub loaded: u32,
    pub total: u32,
}

impl LoadStatus {
    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }
}

/// Parses `"<loaded> of <total> loaded"`.
pub fn parse_load_status(text: &str) -> Result<LoadStatus, ScrapeError> {
    let malformed = || ScrapeError::MalformedStatus(text.to_owned());

    let tokens = text.split_whitespace().collect::<Vec<_>>();
    let [loaded, "of", total, "loaded", ..] = tokens.as_slice() else {
        return Err(malformed());
    };

    Ok(LoadStatus {
        loaded: loaded.parse().map_err(|_| malformed())?,
        total: total.parse().map_err(|_| malformed())?,
    })
}
