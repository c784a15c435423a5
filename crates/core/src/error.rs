use thiserror::Error;

use crate::model::ParseIdError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
