// Centralized ingestion limits to harden against untrusted documents (JSON)

// Document size caps
pub const MAX_STATEMENTS: usize = 200_000;
pub const MAX_LABELS: usize = 20_000;
pub const MAX_CHOICES_PER_MENU: usize = 256;

// Nesting: label -> menu -> choice body -> ...
pub const MAX_DEPTH: usize = 64;

// Strings
pub const MAX_TEXT_LEN: usize = 64 * 1024;
pub const MAX_NAME_LEN: usize = 256;

#[inline]
pub fn text_within_bounds(s: &str) -> bool { s.len() <= MAX_TEXT_LEN }

#[inline]
pub fn name_within_bounds(s: &str) -> bool { !s.is_empty() && s.len() <= MAX_NAME_LEN }
