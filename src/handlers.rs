use crate::{
    catalog::{Catalog, CatalogErr, Term, UnknownTermErr},
    protocol::{
        command::Command,
        message::{ErrorKind, Response},
    },
    registration::{InvalidFormErr, RegistrationErr, RegistrationForm, RegistrationLog},
};

pub const LOAD_COMMAND: &str = "CHARGER";
pub const REGISTER_COMMAND: &str = "INSCRIRE";

/// Errors that are reported back to the client as an error response
#[derive(thiserror::Error, Debug)]
pub enum RequestErr {
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("{0}")]
    UnknownTerm(#[from] UnknownTermErr),

    #[error("INSCRIRE requires a registration form")]
    MissingForm,

    #[error("invalid registration form: {0}")]
    InvalidForm(#[from] InvalidFormErr),

    #[error("failed to read the course catalog")]
    Catalog(#[from] CatalogErr),

    #[error("failed to record the registration")]
    LogWrite(#[source] tokio::io::Error),
}

impl RequestErr {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) => ErrorKind::Protocol,
            Self::UnknownCommand(_)
            | Self::UnknownTerm(_)
            | Self::MissingForm
            | Self::InvalidForm(_) => ErrorKind::Input,
            Self::Catalog(_) | Self::LogWrite(_) => ErrorKind::Server,
        }
    }
}

impl From<RegistrationErr> for RequestErr {
    fn from(err: RegistrationErr) -> Self {
        match err {
            RegistrationErr::Invalid(err) => Self::InvalidForm(err),
            RegistrationErr::Io(err) => Self::LogWrite(err),
        }
    }
}

impl From<RequestErr> for Response {
    fn from(err: RequestErr) -> Self {
        Response::error(err.kind(), err.to_string())
    }
}

/// A request handler, along with the store it works on
#[derive(Debug)]
pub enum Handler {
    /// answers `CHARGER <term>` with the courses offered in that term
    Load(Catalog),
    /// records the form sent along with `INSCRIRE`
    Register(RegistrationLog),
}

impl Handler {
    /// returns None when the command isn't one this handler reacts to
    pub async fn handle(
        &self,
        command: &Command,
        form: Option<&RegistrationForm>,
    ) -> Option<Result<Response, RequestErr>> {
        match self {
            Self::Load(catalog) if command.name == LOAD_COMMAND => {
                Some(load_courses(catalog, &command.argument).await)
            }
            Self::Register(log) if command.name == REGISTER_COMMAND => {
                Some(register(log, form).await)
            }
            _ => None,
        }
    }
}

async fn load_courses(catalog: &Catalog, argument: &str) -> Result<Response, RequestErr> {
    let term: Term = argument.parse()?;
    let courses = catalog.load(term).await?;
    tracing::debug!("found {} courses for {}", courses.len(), term);

    Ok(Response::courses(courses))
}

async fn register(
    log: &RegistrationLog,
    form: Option<&RegistrationForm>,
) -> Result<Response, RequestErr> {
    let form = form.ok_or(RequestErr::MissingForm)?;
    log.append(form).await?;

    Ok(Response::ok())
}

/// Ordered list of handlers every command is offered to
#[derive(Debug, Default)]
pub struct Registry {
    handlers: Vec<Handler>,
}

impl Registry {
    pub fn register(&mut self, handler: Handler) {
        self.handlers.push(handler);
    }

    /// Offers the command to every handler, in registration order
    ///
    /// returns the outcome of each handler that reacted to the command,
    /// a failing handler doesn't prevent the following ones from running.
    /// a command no handler reacts to results in a single UnknownCommand error.
    pub async fn dispatch(
        &self,
        command: &Command,
        form: Option<&RegistrationForm>,
    ) -> Vec<Result<Response, RequestErr>> {
        let mut outcomes = vec![];
        for handler in self.handlers.iter() {
            if let Some(outcome) = handler.handle(command, form).await {
                outcomes.push(outcome);
            }
        }

        if outcomes.is_empty() {
            outcomes.push(Err(RequestErr::UnknownCommand(command.name.clone())));
        }

        outcomes
    }
}
