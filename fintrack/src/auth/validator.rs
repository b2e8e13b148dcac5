//! Password strength policy and email address syntax.

use std::{collections::HashSet, fmt, fs, path::Path, str::FromStr, sync::LazyLock};

use regex::Regex;

use super::errors::{AuthError, AuthResult};

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static EMAIL_REGEX: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"));

/// Characters that satisfy the special-character rule
const SPECIAL_CHARACTERS: &str = r"!@#$%^&*()_+-=[]{};:\|,.<>/?~";

/// Similarity ratio above which a password counts as derived from the email
const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Strictness of the password policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordPolicyLevel {
    /// Only rejects the empty password
    None,
    Light,
    #[default]
    Medium,
    Strong,
}

impl PasswordPolicyLevel {
    fn min_length(self) -> usize {
        match self {
            PasswordPolicyLevel::None => 1,
            PasswordPolicyLevel::Light => 8,
            PasswordPolicyLevel::Medium | PasswordPolicyLevel::Strong => 10,
        }
    }

    fn is_at_least_medium(self) -> bool {
        matches!(self, PasswordPolicyLevel::Medium | PasswordPolicyLevel::Strong)
    }
}

impl FromStr for PasswordPolicyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(PasswordPolicyLevel::None),
            "light" => Ok(PasswordPolicyLevel::Light),
            "medium" => Ok(PasswordPolicyLevel::Medium),
            "strong" => Ok(PasswordPolicyLevel::Strong),
            other => Err(format!("unknown password validation level: {other}")),
        }
    }
}

impl fmt::Display for PasswordPolicyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PasswordPolicyLevel::None => "none",
            PasswordPolicyLevel::Light => "light",
            PasswordPolicyLevel::Medium => "medium",
            PasswordPolicyLevel::Strong => "strong",
        };
        f.write_str(name)
    }
}

/// Password policy checker.
///
/// Every applicable rule runs and all violations are reported together.
#[derive(Debug, Clone, Default)]
pub struct PasswordValidator {
    level: PasswordPolicyLevel,
    common_passwords: HashSet<String>,
}

impl PasswordValidator {
    /// Create a validator with an empty blocklist
    pub fn new(level: PasswordPolicyLevel) -> Self {
        Self {
            level,
            common_passwords: HashSet::new(),
        }
    }

    /// Create a validator with a blocklist loaded from a newline-delimited file.
    ///
    /// A missing or unreadable file leaves the blocklist empty.
    pub fn with_common_passwords_file(level: PasswordPolicyLevel, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let common_passwords = match fs::read_to_string(path) {
            Ok(contents) => parse_blocklist(&contents),
            Err(e) => {
                log::warn!(
                    "Common password list {} not loaded, blocklist disabled: {e}",
                    path.display()
                );
                HashSet::new()
            }
        };

        log::info!(
            "Password validator ready (level={level}, blocklist={} entries)",
            common_passwords.len()
        );

        Self {
            level,
            common_passwords,
        }
    }

    /// Create a validator with an explicit blocklist
    pub fn with_common_passwords<I, S>(level: PasswordPolicyLevel, passwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let common_passwords = passwords
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            level,
            common_passwords,
        }
    }

    /// Configured strictness
    pub fn level(&self) -> PasswordPolicyLevel {
        self.level
    }

    /// Validate a password, returning every violation (empty means valid)
    ///
    /// # Arguments
    ///
    /// * `password` - Candidate password
    /// * `email` - Account email; its local part is used for the similarity rule
    pub fn validate(&self, password: &str, email: Option<&str>) -> Vec<String> {
        let mut errors = Vec::new();

        if self.level == PasswordPolicyLevel::None {
            if password.is_empty() {
                errors.push("Password must not be empty".to_string());
            }
            return errors;
        }

        self.check_length(password, &mut errors);
        self.check_characters(password, &mut errors);

        if self.level.is_at_least_medium() {
            if let Some(email) = email {
                check_similarity(password, email, &mut errors);
            }
            self.check_common_password(password, &mut errors);
        }

        errors
    }

    fn check_length(&self, password: &str, errors: &mut Vec<String>) {
        let min_len = self.level.min_length();
        if password.chars().count() < min_len {
            errors.push(format!("Password must be at least {min_len} characters long"));
        }
    }

    fn check_characters(&self, password: &str, errors: &mut Vec<String>) {
        if !password.chars().any(|c| c.is_ascii_alphabetic()) {
            errors.push("Password must contain at least one letter".to_string());
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one digit".to_string());
        }

        if self.level.is_at_least_medium() && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c))
        {
            errors.push("Password must contain at least one special character".to_string());
        }

        if self.level == PasswordPolicyLevel::Strong {
            if !password.chars().any(|c| c.is_ascii_lowercase()) {
                errors.push("Password must contain at least one lowercase letter".to_string());
            }
            if !password.chars().any(|c| c.is_ascii_uppercase()) {
                errors.push("Password must contain at least one uppercase letter".to_string());
            }
        }
    }

    fn check_common_password(&self, password: &str, errors: &mut Vec<String>) {
        if self.common_passwords.contains(&password.to_lowercase()) {
            errors.push("Password is too common".to_string());
        }
    }
}

fn parse_blocklist(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn check_similarity(password: &str, email: &str, errors: &mut Vec<String>) {
    let password = password.to_lowercase();
    let local_part = email
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    if local_part.is_empty() {
        return;
    }

    if password == local_part {
        errors.push("Password must not match the email".to_string());
    } else if password.contains(&local_part) {
        errors.push("Password must not contain the email".to_string());
    } else if similarity_ratio(&local_part, &password) > SIMILARITY_THRESHOLD {
        errors.push("Password is too similar to the email".to_string());
    }
}

/// Check that an email address is syntactically valid
///
/// # Errors
///
/// * `AuthError::InvalidEmail` - Empty, too long or malformed address
pub fn validate_email(email: &str) -> AuthResult<()> {
    if email.is_empty() {
        return Err(AuthError::InvalidEmail(
            "Email address cannot be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(AuthError::InvalidEmail(format!(
            "Email address cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    let pattern = EMAIL_REGEX
        .as_ref()
        .map_err(|e| AuthError::Configuration(format!("email pattern: {e}")))?;
    if !pattern.is_match(email) {
        return Err(AuthError::InvalidEmail(
            "Invalid email address format".to_string(),
        ));
    }

    Ok(())
}

/// Ratcliff/Obershelp similarity: `2 * matches / (len(a) + len(b))`.
///
/// Matches are found by taking the longest common block, then recursing on
/// the unmatched text to its left and right.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matches = matching_characters(&a, &b);
    2.0 * matches as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        matched += size;
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    matched
}

/// Longest common block in `a[a_lo..a_hi]` and `b[b_lo..b_hi]`, earliest in `a` then `b` on ties
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);
    // run lengths ending at (i - 1, j) for the previous row
    let mut prev = vec![0usize; b_hi - b_lo + 1];

    for i in a_lo..a_hi {
        let mut current = vec![0usize; b_hi - b_lo + 1];
        for j in b_lo..b_hi {
            if a[i] == b[j] {
                let k = prev[j - b_lo] + 1;
                current[j - b_lo + 1] = k;
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        prev = current;
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ann@example.com").is_ok());
        assert!(validate_email("ann.lee+bills@example.co.uk").is_ok());

        let rejected = [
            "",
            "not-an-email",
            "ann@",
            "@example.com",
            "ann@example",
            "a b@example.com",
        ];
        for bad in rejected {
            assert!(
                matches!(validate_email(bad), Err(AuthError::InvalidEmail(_))),
                "{bad:?} should be rejected"
            );
        }

        let long = format!("{}@example.com", "a".repeat(MAX_EMAIL_LENGTH));
        assert!(matches!(validate_email(&long), Err(AuthError::InvalidEmail(_))));
    }

    #[test]
    fn test_none_level_only_rejects_empty() {
        let validator = PasswordValidator::new(PasswordPolicyLevel::None);
        assert_eq!(validator.validate("", None).len(), 1);
        assert!(validator.validate("a", None).is_empty());
    }

    #[test]
    fn test_light_level() {
        let validator = PasswordValidator::new(PasswordPolicyLevel::Light);
        assert!(validator.validate("abcdefg1", None).is_empty());

        let errors = validator.validate("abc", None);
        assert_eq!(errors.len(), 2, "length and digit: {errors:?}");
    }

    #[test]
    fn test_strong_rejects_password1() {
        let validator = PasswordValidator::new(PasswordPolicyLevel::Strong);
        let errors = validator.validate("password1", None);
        assert!(errors.iter().any(|e| e.contains("special")));
        assert!(errors.iter().any(|e| e.contains("uppercase")));
        assert!(errors.iter().any(|e| e.contains("at least 10")));
    }

    #[test]
    fn test_strong_accepts_mixed_password() {
        let validator = PasswordValidator::new(PasswordPolicyLevel::Strong);
        assert!(validator.validate("Str0ng!Pass", None).is_empty());
        assert!(
            validator
                .validate("Str0ng!Pass", Some("ann.lee@example.com"))
                .is_empty()
        );
    }

    #[test]
    fn test_similarity_rules() {
        let validator = PasswordValidator::new(PasswordPolicyLevel::Medium);

        let errors = validator.validate("johnsmith!1", Some("johnsmith!1@example.com"));
        assert!(errors.iter().any(|e| e.contains("must not match")));

        let errors = validator.validate("xJohnSmith!1", Some("johnsmith@example.com"));
        assert!(errors.iter().any(|e| e.contains("must not contain")));

        let errors = validator.validate("johnsmiht!1", Some("johnsmith@example.com"));
        assert!(errors.iter().any(|e| e.contains("too similar")), "{errors:?}");
    }

    #[test]
    fn test_light_skips_similarity_and_blocklist() {
        let validator =
            PasswordValidator::with_common_passwords(PasswordPolicyLevel::Light, ["qwerty123"]);
        assert!(
            validator
                .validate("qwerty123", Some("qwerty123@example.com"))
                .is_empty()
        );
    }

    #[test]
    fn test_blocklist_is_case_insensitive() {
        let validator = PasswordValidator::with_common_passwords(
            PasswordPolicyLevel::Medium,
            ["Summer2024!!"],
        );
        let errors = validator.validate("SUMMER2024!!", None);
        assert_eq!(errors, vec!["Password is too common".to_string()]);
    }

    #[test]
    fn test_blocklist_file_loading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  Passw0rd!!xx  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "letmein!123").unwrap();

        let validator =
            PasswordValidator::with_common_passwords_file(PasswordPolicyLevel::Medium, file.path());
        assert!(!validator.validate("passw0rd!!xx", None).is_empty());
        assert!(!validator.validate("LetMeIn!123", None).is_empty());
    }

    #[test]
    fn test_missing_blocklist_file_degrades_to_empty() {
        let validator = PasswordValidator::with_common_passwords_file(
            PasswordPolicyLevel::Medium,
            "/nonexistent/common-passwords.txt",
        );
        assert!(validator.validate("Anything!234", None).is_empty());
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(
            "STRONG".parse::<PasswordPolicyLevel>(),
            Ok(PasswordPolicyLevel::Strong)
        );
        assert_eq!(
            " light ".parse::<PasswordPolicyLevel>(),
            Ok(PasswordPolicyLevel::Light)
        );
        assert!("paranoid".parse::<PasswordPolicyLevel>().is_err());
    }

    #[test]
    fn test_similarity_ratio_matches_reference_values() {
        assert_eq!(similarity_ratio("abcd", "bcde"), 0.75);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        assert_eq!(similarity_ratio("same", "same"), 1.0);
        // "ab" then "d" on the right
        assert!((similarity_ratio("abxd", "abyd") - 0.75).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_similarity_ratio_is_bounded(a in "[a-z]{0,16}", b in "[a-z]{0,16}") {
            let ratio = similarity_ratio(&a, &b);
            prop_assert!((0.0..=1.0).contains(&ratio));
        }

        #[test]
        fn prop_every_violation_is_reported(password in "[a-z]{0,7}") {
            // letters only and short: length + digit always fail under light
            let validator = PasswordValidator::new(PasswordPolicyLevel::Light);
            let errors = validator.validate(&password, None);
            prop_assert!(errors.len() >= 2);
        }
    }
}
