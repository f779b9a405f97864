//! Image proxy URL signing.
//!
//! # Usage
//!
//! ```bash
//! # Sign a full proxy path (ops + file)
//! MEDIA_SECRET=... mq-cli sign fit-in/800x800/kiwi.webp
//! ```

use mariquita_storefront::media::{MediaError, sign_path};

/// Sign `path` and print `"{signature}/{path}"`.
///
/// # Errors
///
/// Returns an error if the path or secret is empty.
#[allow(clippy::print_stdout)]
pub fn run(path: &str, secret: &str) -> Result<(), MediaError> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return Err(MediaError::EmptyFile);
    }

    println!("{}", sign_path(path, secret)?);
    Ok(())
}
