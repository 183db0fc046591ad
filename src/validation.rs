// Field-level validation shared by the account, catalog and review modules.

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Collects field messages so a caller sees every problem at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(message.into());
        }
        self
    }

    pub fn length(
        &mut self,
        value: &str,
        min: usize,
        max: usize,
        field: &str,
    ) -> &mut Self {
        let len = value.chars().count();
        if len < min || len > max {
            self.errors.push(format!(
                "{} must be between {} and {} characters",
                field, min, max
            ));
        }
        self
    }

    pub fn max_length(&mut self, value: &str, max: usize, field: &str) -> &mut Self {
        if value.chars().count() > max {
            self.errors
                .push(format!("{} cannot exceed {} characters", field, max));
        }
        self
    }

    pub fn image_url(&mut self, value: &str, field: &str) -> &mut Self {
        if !is_image_url(value) {
            self.errors
                .push(format!("{} must be a valid image URL", field));
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), Vec<String>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }
}

/// http(s) URL whose path ends in a known image extension.
pub fn is_image_url(value: &str) -> bool {
    let Ok(parsed) = url::Url::parse(value.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return false;
    }
    let path = parsed.path().to_ascii_lowercase();
    path.rsplit_once('.')
        .map(|(stem, ext)| stem.len() > 1 && IMAGE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Ratings live in [1, 5] on a 0.5 grid.
pub fn is_half_step_rating(value: f64) -> bool {
    value.is_finite() && (1.0..=5.0).contains(&value) && (value * 2.0).fract() == 0.0
}

/// Loose `local@domain.tld` check; delivery is the real proof of ownership.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let valid_chars = |s: &str| {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
    };
    if local.is_empty() || !valid_chars(local) || !valid_chars(domain) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty()
                && !host.starts_with('.')
                && (2..=24).contains(&tld.len())
                && tld.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}
