/// A command word and its raw argument, as sent on a request line
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub argument: String,
}

impl Command {
    /// Splits a request line on its first run of whitespace
    ///
    /// never fails, an empty line results in an empty command.
    /// only the line terminator is stripped, the argument is kept as is
    /// and may contain more whitespace.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_start().trim_end_matches(['\r', '\n']);

        match line.split_once(char::is_whitespace) {
            Some((name, argument)) => Self {
                name: name.into(),
                argument: argument.trim_start().into(),
            },
            None => Self {
                name: line.into(),
                argument: String::new(),
            },
        }
    }
}
