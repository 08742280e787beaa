#[cfg(test)]
#[path = "attachment_test.rs"]
mod tests;

use std::path;

use anyhow::Result;
use tokio::fs;

use super::ChatError;

pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

pub const MIME_PLAIN_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const ALLOWED_MIME_TYPES: [&str; 3] = [MIME_PLAIN_TEXT, MIME_PDF, MIME_DOCX];

fn too_large(name: &str) -> ChatError {
    return ChatError::InvalidAttachment(format!("{name} is larger than the 10 MiB limit."));
}

/// A file the user attached to their next prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(name: &str, bytes: Vec<u8>) -> Attachment {
        return Attachment {
            name: name.to_string(),
            mime_type: Attachment::mime_type_for(name).to_string(),
            bytes,
        };
    }

    pub async fn from_path(file_path: &path::Path) -> Result<Attachment> {
        let name = file_path
            .file_name()
            .map(|name| return name.to_string_lossy().to_string())
            .unwrap_or_else(|| return file_path.to_string_lossy().to_string());

        let metadata = fs::metadata(file_path).await?;
        if !metadata.is_file() {
            return Err(ChatError::InvalidAttachment(format!("{name} isn't a regular file.")).into());
        }
        if metadata.len() > MAX_ATTACHMENT_BYTES as u64 {
            return Err(too_large(&name).into());
        }

        let bytes = fs::read(file_path).await?;
        return Ok(Attachment::new(&name, bytes));
    }

    pub fn mime_type_for(name: &str) -> &'static str {
        let extension = path::Path::new(name)
            .extension()
            .map(|ext| return ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" => return MIME_PLAIN_TEXT,
            "pdf" => return MIME_PDF,
            "docx" => return MIME_DOCX,
            _ => return "application/octet-stream",
        }
    }

    pub fn size(&self) -> usize {
        return self.bytes.len();
    }

    /// Checked before anything is sent, a rejected file never reaches the backend.
    pub fn validate(&self) -> Result<(), ChatError> {
        if !ALLOWED_MIME_TYPES.contains(&self.mime_type.as_str()) {
            return Err(ChatError::InvalidAttachment(format!(
                "{} isn't a supported file type. Attach a .txt, .pdf, or .docx file.",
                self.name
            )));
        }

        if self.size() > MAX_ATTACHMENT_BYTES {
            return Err(too_large(&self.name));
        }

        return Ok(());
    }
}
