use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// The waypoint or recipient configuration could not be used.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub msg: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for ConfigError {}

/// A message could not be handed to one of the recipients.
#[derive(Debug, Clone)]
pub struct DispatchError {
    pub recipient: String,
    pub msg: String,
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "unable to notify {}: {}", self.recipient, self.msg)
    }
}

impl Error for DispatchError {}
