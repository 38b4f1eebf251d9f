//! Short code generation
//!
//! Codes are 10 characters drawn uniformly from `[a-zA-Z0-9]`, roughly
//! 5.95e17 possibilities. The generator asks the store for a code it has
//! checked against existing links and falls back to a local draw when that
//! call fails. The local draw is not guaranteed unique; callers that need a
//! hard guarantee retry on `Conflict` at insert time.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::storage::Storage;

pub const CODE_LENGTH: usize = 10;

pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw a random code locally.
pub fn random_code() -> String {
    std::iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
        .take(CODE_LENGTH)
        .collect()
}

/// Whether `code` has the shape of a generated code.
pub fn is_generated_shape(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    /// The store produced the code after checking it against existing links
    Remote,
    /// The remote call failed and the code was drawn locally
    LocalFallback,
}

#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub code: String,
    pub source: CodeSource,
}

#[derive(Clone)]
pub struct CodeGenerator {
    storage: Arc<dyn Storage>,
}

impl CodeGenerator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn generate(&self) -> String {
        self.generate_with_source().await.code
    }

    /// Generate a code and report which strategy produced it.
    pub async fn generate_with_source(&self) -> GeneratedCode {
        match self.storage.generate_unique_code().await {
            Ok(code) if !code.trim().is_empty() => {
                debug!(short_code = %code, "generated short code remotely");
                GeneratedCode {
                    code: code.trim().to_string(),
                    source: CodeSource::Remote,
                }
            }
            Ok(_) => {
                warn!("unique code call returned an empty code, using local fallback");
                Self::local()
            }
            Err(err) => {
                warn!(error = %err, "unique code call failed, using local fallback");
                Self::local()
            }
        }
    }

    fn local() -> GeneratedCode {
        GeneratedCode {
            code: random_code(),
            source: CodeSource::LocalFallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::collections::HashSet;

    #[test]
    fn test_random_code_shape() {
        for _ in 0..1_000 {
            let code = random_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()), "bad code {code}");
            assert!(is_generated_shape(&code));
        }
    }

    #[test]
    fn test_random_code_uses_whole_alphabet() {
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            seen.extend(random_code().chars());
        }
        // 20k draws over 62 symbols; missing one is astronomically unlikely
        assert_eq!(seen.len(), ALPHABET.len());
    }

    #[test]
    fn test_is_generated_shape_rejects() {
        assert!(!is_generated_shape("abc"));
        assert!(!is_generated_shape("abcdefghi-"));
        assert!(!is_generated_shape("abcdefghijk"));
    }

    #[tokio::test]
    async fn test_generate_prefers_remote() {
        let storage = Arc::new(MemoryStorage::new());
        let generator = CodeGenerator::new(storage);

        let generated = generator.generate_with_source().await;
        assert_eq!(generated.source, CodeSource::Remote);
        assert!(is_generated_shape(&generated.code));
    }

    #[tokio::test]
    async fn test_generate_falls_back_when_remote_fails() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_unique_code_failure(true);
        let generator = CodeGenerator::new(storage);

        let generated = generator.generate_with_source().await;
        assert_eq!(generated.source, CodeSource::LocalFallback);
        assert!(is_generated_shape(&generated.code));
    }

    #[tokio::test]
    async fn test_generate_falls_back_when_storage_unavailable() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_unavailable(true);
        let generator = CodeGenerator::new(storage);

        let code = generator.generate().await;
        assert!(is_generated_shape(&code));
    }
}
