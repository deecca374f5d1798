//! Turn raw file bytes into corpus text.
//!
//! Text formats must be valid UTF-8. PDFs go through `pdf-extract`. Any
//! failure is returned to the walker, which logs it and skips the file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Decode `bytes` according to the file's lower-cased `extension`.
pub fn extract_text(bytes: Vec<u8>, extension: &str) -> Result<String, ExtractError> {
    match extension {
        ".pdf" => extract_pdf(&bytes),
        _ => Ok(String::from_utf8(bytes)?),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed documents.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("extractor panicked".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        let text = extract_text("# Título\n".as_bytes().to_vec(), ".md").unwrap();
        assert_eq!(text, "# Título\n");
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let err = extract_text(vec![0xff, 0xfe, 0x00], ".txt").unwrap_err();
        assert!(matches!(err, ExtractError::Encoding(_)));
    }

    #[test]
    fn garbage_pdf_is_a_pdf_error() {
        let err = extract_text(b"not a pdf".to_vec(), ".pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
