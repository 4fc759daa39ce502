use thiserror::Error;

/// Errors surfaced to RP/AR/EE, already classified per §7's error taxonomy
/// (everything from the cluster API is transient-external unless the
/// object simply doesn't exist, which callers treat as a normal `None`).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("kubernetes api error: {0}")]
    Api(String),

    #[error("pod {0} did not report a node assignment within the deadline")]
    SchedulingTimeout(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<kube::Error> for GatewayError {
    fn from(err: kube::Error) -> Self {
        GatewayError::Api(err.to_string())
    }
}
