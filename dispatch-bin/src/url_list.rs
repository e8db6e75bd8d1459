//! Reading newline-separated URLs for `--input-file` and `-` (stdin)

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Lines starting with this marker are ignored
const COMMENT_MARKER: &str = "#";

/// URLs read from a file or stdin, one per line
#[derive(Debug, Clone)]
pub(crate) struct UrlList {
    pub(crate) urls: Vec<String>,
}

impl UrlList {
    /// Read from any reader, skipping empty lines and comments
    pub(crate) fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let urls = BufReader::new(reader)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .context("Cannot read lines from reader")?
            .into_iter()
            .filter_map(|line| {
                let line = line.trim();
                (!line.is_empty() && !line.starts_with(COMMENT_MARKER)).then(|| line.to_string())
            })
            .collect();
        Ok(UrlList { urls })
    }
}

impl TryFrom<&Path> for UrlList {
    type Error = anyhow::Error;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        if path == Path::new("-") {
            Self::from_reader(std::io::stdin())
        } else {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Cannot open input file: {}", path.display()))?;
            Self::from_reader(file)
        }
    }
}
