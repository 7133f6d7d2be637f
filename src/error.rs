use std::{error::Error, fmt};

pub type GenericError = Box<dyn Error + Send + Sync + 'static>;

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

#[derive(Debug)]
pub struct ProbeError {
    pub message: String,
    pub source: Option<GenericError>,
}

impl ProbeError {
    pub(crate) fn new(message: impl Into<String>) -> ProbeError {
        ProbeError { message: message.into(), source: None }
    }

    pub(crate) fn with_source(message: impl Into<String>, source: GenericError) -> ProbeError {
        ProbeError { message: message.into(), source: Some(source) }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "ProbeError")?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl Error for ProbeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| &**e as &(dyn Error + 'static))
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(error: std::io::Error) -> ProbeError {
        ProbeError { message: error.to_string(), source: Some(Box::new(error)) }
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn fmt_without_message() {
        let error = ProbeError::new("");
        assert_eq!("ProbeError", format!("{error}"));
    }

    #[test]
    fn fmt_with_message() {
        let error = ProbeError::new("testing std::fmt::Display");
        assert_eq!("ProbeError: testing std::fmt::Display", format!("{error}"));
    }

    #[test]
    fn source_is_none_without_inner_error() {
        assert!(ProbeError::new("no source").source().is_none());
    }

    #[test]
    fn probe_error_from_std_io_error() {
        let std_io_error = std::io::Error::from(ErrorKind::PermissionDenied);
        let error = ProbeError::from(std_io_error);
        assert!(error.source().is_some());
    }
}
