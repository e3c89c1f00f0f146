use thiserror::Error;

/// Why a remote lookup produced no usable data. Always recovered locally.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend answered {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed backend payload: {0}")]
    Malformed(String),
    #[error("invalid airport code {0:?}")]
    InvalidCode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("no source, layer or marker named {0}")]
    Missing(String),
    #[error("{0} is already drawn")]
    Duplicate(String),
    #[error("surface rejected {0}")]
    Rejected(String),
}

/// Rejected at the HTTP/CLI boundary before the engine is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("airline code must be two letters or digits, got {0:?}")]
    AirlineCode(String),
    #[error("flight number must not be empty")]
    EmptyFlightNumber,
    #[error("flight number {0:?} contains unexpected characters")]
    FlightNumber(String),
}

pub fn validate_airline_code(raw: &str) -> Result<String, InputError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(code)
    } else {
        Err(InputError::AirlineCode(raw.to_string()))
    }
}

pub fn validate_flight_number(raw: &str) -> Result<String, InputError> {
    let number = raw.trim().to_ascii_uppercase();
    if number.is_empty() {
        return Err(InputError::EmptyFlightNumber);
    }
    if !number.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(InputError::FlightNumber(raw.to_string()));
    }
    Ok(number)
}
