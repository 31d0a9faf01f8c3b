use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

const FIELD_SEPARATOR: char = '\t';

/// An academic term courses are offered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Fall,
    Winter,
    Summer,
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown term code: {0:?}")]
pub struct UnknownTermErr(pub String);

impl Term {
    /// the label used for this term in the catalog file
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fall => "automne",
            Self::Winter => "hiver",
            Self::Summer => "ete",
        }
    }

    /// checks a catalog session field against this term, ignoring case
    pub fn matches(&self, session: &str) -> bool {
        session.eq_ignore_ascii_case(self.label())
    }
}

// terms travel on the wire as their numeric code
impl FromStr for Term {
    type Err = UnknownTermErr;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "1" => Ok(Self::Fall),
            "2" => Ok(Self::Winter),
            "3" => Ok(Self::Summer),
            _ => Err(UnknownTermErr(code.into())),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub session: String,
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("expected 3 tab separated fields, found {0}")]
pub struct MalformedLineErr(usize);

impl Course {
    pub fn new(code: impl Into<String>, name: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            session: session.into(),
        }
    }
}

impl FromStr for Course {
    type Err = MalformedLineErr;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches('\r');
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();

        match fields[..] {
            [code, name, session, ..] => Ok(Course::new(code, name, session)),
            _ => Err(MalformedLineErr(fields.len())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogErr {
    #[error("{0}")]
    Io(#[from] tokio::io::Error),
}

/// Read-only view over the course catalog file
///
/// every load opens its own handle, so concurrent loads need no locking.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns every course offered in the given term, in catalog order
    ///
    /// malformed lines are skipped and reported in the logs only,
    /// a missing or unreadable catalog is an error.
    pub async fn load(&self, term: Term) -> Result<Vec<Course>, CatalogErr> {
        let file = File::open(&self.path).await?;
        let mut reader = BufReader::new(file);

        let mut courses = vec![];
        let mut skipped = vec![];
        let mut line_number = 0usize;
        let mut raw = vec![];
        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw).await? == 0 {
                break;
            }
            line_number += 1;

            // an undecodable line only costs that line
            let Ok(line) = std::str::from_utf8(&raw) else {
                tracing::debug!("catalog line {} is not valid utf-8", line_number);
                skipped.push(line_number);
                continue;
            };
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<Course>() {
                Ok(course) if term.matches(&course.session) => courses.push(course),
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!("catalog line {} is malformed: {}", line_number, err);
                    skipped.push(line_number);
                }
            }
        }

        if !skipped.is_empty() {
            tracing::warn!(
                count = skipped.len(),
                lines = ?skipped,
                "skipped malformed lines in {}",
                self.path.display()
            );
        }

        Ok(courses)
    }
}
