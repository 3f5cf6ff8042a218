mod helpers;
mod middleware;
mod token;

pub use helpers::{
    TokenValidationError, ValidatedToken, extract_basic_auth_token, extract_token_from_header,
    validate_token,
};
pub use middleware::{AuthError, OptionalUser, RequireSysAdmin, RequireUser};
pub use token::{IssuedToken, TOKEN_PREFIX, TokenGenerator, parse_token};
