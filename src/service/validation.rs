use crate::error::{Error, Result};

const MAX_BUCKET_NAME_LEN: usize = 63;
const MAX_FILE_NAME_LEN: usize = 255;
const MAX_EMAIL_LEN: usize = 254;

fn is_valid_bucket_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("Bucket name cannot be empty".into()));
    }
    if name.len() > MAX_BUCKET_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "Bucket name cannot exceed {MAX_BUCKET_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_bucket_char) {
        return Err(Error::InvalidInput(
            "Bucket name can only contain alphanumeric characters, hyphens, and underscores"
                .into(),
        ));
    }
    Ok(())
}

/// File names are stored verbatim and used in `Content-Disposition`, so path
/// separators and control characters are refused rather than rewritten.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("File name cannot be empty".into()));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "File name cannot exceed {MAX_FILE_NAME_LEN} bytes"
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidInput("File name cannot be a relative path".into()));
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(Error::InvalidInput(
            "File name cannot contain path separators or control characters".into(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

    if !valid {
        return Err(Error::InvalidInput(format!("Invalid email address: {email}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        assert!(validate_bucket_name("photos").is_ok());
        assert!(validate_bucket_name("my_bucket-2").is_ok());
        assert!(validate_bucket_name(&"a".repeat(63)).is_ok());

        assert!(validate_bucket_name("").is_err());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
        assert!(validate_bucket_name("has space").is_err());
        assert!(validate_bucket_name("dots.not.allowed").is_err());
    }

    #[test]
    fn test_file_names() {
        assert!(validate_file_name("report 2024.pdf").is_ok());
        assert!(validate_file_name("ünïcode.txt").is_ok());

        assert!(validate_file_name("   ").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("dir/file.txt").is_err());
        assert!(validate_file_name("dir\\file.txt").is_err());
        assert!(validate_file_name("bad\nname").is_err());
    }

    #[test]
    fn test_emails() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("  bob@example.org ").is_ok());

        assert!(validate_email("alice").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@localhost").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }
}
