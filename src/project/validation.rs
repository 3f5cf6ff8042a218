use thiserror::Error;

pub const PROJECT_NAME_MIN_LEN: usize = 2;
pub const PROJECT_NAME_MAX_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NameError {
    #[error(
        "project name must be between {PROJECT_NAME_MIN_LEN} and {PROJECT_NAME_MAX_LEN} characters"
    )]
    InvalidLength,

    #[error(
        "project name must be lowercase alphanumeric segments separated by single '.', '_' or '-'"
    )]
    InvalidCharacters,
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '_' | '-')
}

/// Validates a project name: `[a-z0-9]+(?:[._-][a-z0-9]+)*` over the whole
/// string, with the length checked first.
pub fn validate_project_name(name: &str) -> Result<(), NameError> {
    if name.len() < PROJECT_NAME_MIN_LEN || name.len() > PROJECT_NAME_MAX_LEN {
        return Err(NameError::InvalidLength);
    }

    let mut previous_was_separator = true;
    for c in name.chars() {
        if is_segment_char(c) {
            previous_was_separator = false;
        } else if is_separator(c) && !previous_was_separator {
            previous_was_separator = true;
        } else {
            return Err(NameError::InvalidCharacters);
        }
    }

    if previous_was_separator {
        return Err(NameError::InvalidCharacters);
    }
    Ok(())
}
