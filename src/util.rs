//! Small utility helpers used across modules.

/// True if `slug` is non-empty and only contains `a-z`, `0-9` and `-`.
pub fn is_valid_slug(slug: &str) -> bool {
  !slug.is_empty() && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Derive a URL-safe slug from free text ("What's Your Style?" -> "whats-your-style").
/// Runs of other characters collapse to one hyphen; apostrophes are dropped.
pub fn slugify(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut pending_dash = false;
  for ch in text.chars() {
    if ch.is_ascii_alphanumeric() {
      if pending_dash && !out.is_empty() {
        out.push('-');
      }
      pending_dash = false;
      out.push(ch.to_ascii_lowercase());
    } else if ch != '\'' && ch != '\u{2019}' {
      pending_dash = true;
    }
  }
  out
}

/// Image categories, each stored under its own folder of the uploader's namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
  Cover,
  Question,
  Result,
}

impl ImageKind {
  pub fn folder(self) -> &'static str {
    match self {
      ImageKind::Cover => "covers",
      ImageKind::Question => "questions",
      ImageKind::Result => "results",
    }
  }
}

/// `<user>/<folder>/<millis>-<file>`, keeping only path-safe filename characters.
pub fn blob_path(user_id: &str, kind: ImageKind, unix_millis: i64, filename: &str) -> String {
  let clean: String = filename
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();
  let clean = if clean.trim_matches('_').is_empty() { "image".to_string() } else { clean };
  format!("{}/{}/{}-{}", user_id, kind.folder(), unix_millis, clean)
}

/// Log-safe truncation for large strings.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
