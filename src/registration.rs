use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

use crate::catalog::Course;

const FIELD_SEPARATOR: &str = "\t";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub course: Course,
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum InvalidFormErr {
    #[error("student id must not be empty")]
    MissingStudentId,

    #[error("email address must contain '@'")]
    BadEmail,

    #[error("course code must not be empty")]
    MissingCourseCode,

    #[error("course session must not be empty")]
    MissingSession,

    #[error("{0} must not contain tabs or line breaks")]
    IllegalCharacter(&'static str),
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), InvalidFormErr> {
        if self.student_id.trim().is_empty() {
            return Err(InvalidFormErr::MissingStudentId);
        }
        if !self.email.contains('@') {
            return Err(InvalidFormErr::BadEmail);
        }
        if self.course.code.trim().is_empty() {
            return Err(InvalidFormErr::MissingCourseCode);
        }
        if self.course.session.trim().is_empty() {
            return Err(InvalidFormErr::MissingSession);
        }

        // every field lands on a single tab separated line
        for (name, value) in self.record_fields() {
            if value.contains(['\t', '\n', '\r']) {
                return Err(InvalidFormErr::IllegalCharacter(name));
            }
        }

        Ok(())
    }

    /// renders the form as one line of the registration log
    pub fn to_record(&self) -> String {
        self.record_fields()
            .map(|(_, value)| value)
            .collect::<Vec<_>>()
            .join(FIELD_SEPARATOR)
    }

    fn record_fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("session", self.course.session.as_str()),
            ("course code", self.course.code.as_str()),
            ("student id", self.student_id.as_str()),
            ("first name", self.first_name.as_str()),
            ("last name", self.last_name.as_str()),
            ("email", self.email.as_str()),
        ]
        .into_iter()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RegistrationErr {
    #[error("{0}")]
    Invalid(#[from] InvalidFormErr),

    #[error("{0}")]
    Io(#[from] tokio::io::Error),
}

/// Append-only log of submitted registrations
///
/// all appends go through a single lock, so records written by
/// concurrent sessions never interleave.
#[derive(Debug)]
pub struct RegistrationLog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl RegistrationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::default(),
        }
    }

    /// Validates the form and appends it to the log as a single record
    ///
    /// every record is preceded by a newline, nothing is written for an invalid form.
    pub async fn append(&self, form: &RegistrationForm) -> Result<(), RegistrationErr> {
        form.validate()?;
        let record = format!("\n{}", form.to_record());

        let _guard = self.writer.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(
            "recorded registration of {} to {}",
            form.student_id,
            form.course.code
        );

        Ok(())
    }
}
