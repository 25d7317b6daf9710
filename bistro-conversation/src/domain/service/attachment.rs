//! 附件读取与预览

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bistro_core::{Result, SyncError};
use tracing::debug;

use crate::domain::model::{AttachmentPayload, AttachmentPreview};

/// 按扩展名推断 MIME 类型
pub fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// 读取附件并生成预览；超过 `max_bytes` 的文件被拒绝
pub async fn read_attachment(
    path: &Path,
    max_bytes: u64,
) -> Result<(AttachmentPreview, AttachmentPayload)> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|err| SyncError::Attachment(format!("{}: {}", path.display(), err)))?;
    if !metadata.is_file() {
        return Err(SyncError::Attachment(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > max_bytes {
        return Err(SyncError::Attachment(format!(
            "{} is {} bytes, limit is {}",
            path.display(),
            metadata.len(),
            max_bytes
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| SyncError::Attachment(format!("{}: {}", path.display(), err)))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("attachment")
        .to_string();
    let mime_type = guess_mime_type(path).to_string();
    let data_url = mime_type
        .starts_with("image/")
        .then(|| format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes)));

    debug!(file_name = %file_name, mime_type = %mime_type, size = bytes.len(), "Attachment loaded");

    let preview = AttachmentPreview {
        file_name: file_name.clone(),
        mime_type: mime_type.clone(),
        size_bytes: bytes.len() as u64,
        data_url,
    };
    let payload = AttachmentPayload {
        file_name,
        mime_type,
        bytes,
    };
    Ok((preview, payload))
}
