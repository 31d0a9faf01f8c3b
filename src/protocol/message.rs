use serde::{Deserialize, Serialize};

use crate::{catalog::Course, registration::RegistrationForm};

/// A single request, sent as one line of json
///
/// `form` is only read by commands that need it.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<RegistrationForm>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    // the request was understood but its content is invalid
    Input,
    // the server failed to access its data
    Server,
    // the request could not be decoded
    Protocol,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Response {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        courses: Option<Vec<Course>>,
    },
    Error {
        kind: ErrorKind,
        error: String,
    },
}

impl Response {
    pub fn courses(courses: Vec<Course>) -> Self {
        Self::Ok {
            courses: Some(courses),
        }
    }

    pub fn ok() -> Self {
        Self::Ok { courses: None }
    }

    pub fn error(kind: ErrorKind, reason: String) -> Self {
        Self::Error {
            kind,
            error: reason,
        }
    }
}
