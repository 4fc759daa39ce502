use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudAdapterError {
    #[error("ec2 api error: {0}")]
    Ec2(String),

    #[error("autoscaling api error: {0}")]
    AutoScaling(String),
}

pub type CloudAdapterResult<T> = Result<T, CloudAdapterError>;
