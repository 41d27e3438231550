use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub created_at: Option<OffsetDateTime>,
}

/// Usernames are derived, not chosen: first and last name concatenated,
/// lower-cased, with all whitespace stripped.
pub fn derive_username(first_name: &str, last_name: &str) -> String {
    format!("{first_name}{last_name}")
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_derivation() {
        assert_eq!(derive_username("Ana", "Lima"), "analima");
        assert_eq!(derive_username("Mary Jane", "van der Berg"), "maryjanevanderberg");
        assert_eq!(derive_username(" Ana ", "Lima"), "analima");
    }
}
