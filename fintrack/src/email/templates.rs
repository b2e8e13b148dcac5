//! Minimal HTML template rendering.
//!
//! Templates are plain HTML with `{{ name }}` placeholders. Values are
//! HTML-escaped on substitution. A template is looked up in the configured
//! directory first and falls back to the built-in copy of the same name.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use super::{EmailError, EmailResult};

/// Confirmation email template name
pub const CONFIRM_EMAIL_TEMPLATE: &str = "confirm_email.html";

/// Password reset email template name
pub const RESET_PASSWORD_TEMPLATE: &str = "reset_password.html";

const BUILTIN_CONFIRM_EMAIL: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <h2>Confirm your registration</h2>
    <p>Follow the link below to confirm your email address:</p>
    <p><a href="{{ confirmation_link }}">Confirm email</a></p>
    <p>If you did not sign up, ignore this message.</p>
  </body>
</html>
"#;

const BUILTIN_RESET_PASSWORD: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <h2>Password reset</h2>
    <p>Follow the link below to choose a new password:</p>
    <p><a href="{{ reset_link }}">Reset password</a></p>
    <p>If you did not request a reset, ignore this message.</p>
  </body>
</html>
"#;

/// Template renderer
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    dir: Option<PathBuf>,
}

impl TemplateRenderer {
    /// Renderer using only the built-in templates
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Renderer that prefers templates found in `dir`
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    /// Render a template with the given variables
    ///
    /// # Errors
    ///
    /// * `EmailError::Template` - Unknown template, unterminated placeholder
    ///   or a placeholder without a value
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> EmailResult<String> {
        let source = self.load(name)?;
        substitute(&source, vars).map_err(|e| EmailError::Template(format!("{name}: {e}")))
    }

    fn load(&self, name: &str) -> EmailResult<String> {
        if let Some(dir) = &self.dir {
            let path = dir.join(name);
            match fs::read_to_string(&path) {
                Ok(source) => return Ok(source),
                Err(e) => debug!("Template {} not loaded ({}), using built-in", path.display(), e),
            }
        }

        match name {
            CONFIRM_EMAIL_TEMPLATE => Ok(BUILTIN_CONFIRM_EMAIL.to_string()),
            RESET_PASSWORD_TEMPLATE => Ok(BUILTIN_RESET_PASSWORD.to_string()),
            _ => Err(EmailError::Template(format!("unknown template {name}"))),
        }
    }
}

fn substitute(source: &str, vars: &[(&str, &str)]) -> Result<String, String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| "unterminated placeholder".to_string())?;
        let key = after[..end].trim();
        let value = vars
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
            .ok_or_else(|| format!("no value for {key}"))?;
        out.push_str(&escape_html(value));
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
