// ============================================================================
// ERRORS — negative-code taxonomy shared by every public operation
// ============================================================================

use thiserror::Error;

/// Everything the engine can fail with.  Each variant maps to a fixed negative
/// integer via [`FlipError::code`] so hosts that only speak integers can still
/// tell failures apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlipError {
    #[error("page flip error: {0}")]
    Other(String),
    #[error("page flip engine is not initialized")]
    Uninitialized,
    #[error("null parameter: {0}")]
    NullParameter(&'static str),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("graphics backend error: {0}")]
    Backend(String),
    #[error("failed to compile shader `{0}`")]
    CompileShader(String),
    #[error("failed to link pipeline `{0}`")]
    LinkProgram(String),
    #[error("failed to create shader module `{0}`")]
    CreateShaderRef(String),
    #[error("failed to create pipeline `{0}`")]
    CreateProgramRef(String),
    #[error("failed to attach vertex stage `{0}`")]
    AttachShader(String),
    #[error("failed to attach fragment stage `{0}`")]
    AttachFragment(String),
    #[error("unsupported bitmap format {0}")]
    UnsupportedBitmapFormat(String),
    #[error("can't read bitmap info: {0}")]
    GetBitmapInfo(String),
    #[error("can't read bitmap data: {0}")]
    GetBitmapData(String),
    #[error("there is no second page")]
    NoTwoPages,
    #[error("page is not created yet")]
    NullPage,
}

pub type Result<T> = std::result::Result<T, FlipError>;

impl FlipError {
    pub const OK: i32 = 0;

    /// Integer code of this error.
    pub fn code(&self) -> i32 {
        match self {
            FlipError::Other(_) => -1,
            FlipError::Uninitialized => -2,
            FlipError::NullParameter(_) => -3,
            FlipError::InvalidParameter(_) => -4,
            FlipError::Backend(_) => -5,
            FlipError::CompileShader(_) => -6,
            FlipError::LinkProgram(_) => -7,
            FlipError::CreateShaderRef(_) => -8,
            FlipError::CreateProgramRef(_) => -9,
            FlipError::AttachShader(_) => -10,
            FlipError::AttachFragment(_) => -11,
            FlipError::UnsupportedBitmapFormat(_) => -12,
            FlipError::GetBitmapInfo(_) => -13,
            FlipError::GetBitmapData(_) => -14,
            FlipError::NoTwoPages => -15,
            FlipError::NullPage => -16,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        FlipError::InvalidParameter(msg.into())
    }
}

/// Collapse an operation result into the integer code hosts expect.
pub fn code_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => FlipError::OK,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_negative() {
        let all = [
            FlipError::Other(String::new()),
            FlipError::Uninitialized,
            FlipError::NullParameter("bitmap"),
            FlipError::InvalidParameter(String::new()),
            FlipError::Backend(String::new()),
            FlipError::CompileShader(String::new()),
            FlipError::LinkProgram(String::new()),
            FlipError::CreateShaderRef(String::new()),
            FlipError::CreateProgramRef(String::new()),
            FlipError::AttachShader(String::new()),
            FlipError::AttachFragment(String::new()),
            FlipError::UnsupportedBitmapFormat(String::new()),
            FlipError::GetBitmapInfo(String::new()),
            FlipError::GetBitmapData(String::new()),
            FlipError::NoTwoPages,
            FlipError::NullPage,
        ];
        let codes: Vec<i32> = all.iter().map(FlipError::code).collect();
        assert_eq!(codes, (1..=16).map(|c| -c).collect::<Vec<_>>());
    }

    #[test]
    fn code_of_ok_is_zero() {
        assert_eq!(code_of(&Ok::<(), FlipError>(())), 0);
        assert_eq!(code_of::<()>(&Err(FlipError::NoTwoPages)), -15);
    }
}
