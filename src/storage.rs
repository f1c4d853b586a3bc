//! Shared storage utilities for media bytes.
//!
//! Used by the upload broker and the media file server to avoid duplicating
//! backend selection. Two backends are supported: local disk
//! (`LOCAL_STORAGE_PATH`) and Google Cloud Storage; local wins when both are
//! configured.

use bytes::Bytes;
use std::path::PathBuf;

/// Download a media object from local storage or GCS.
pub async fn download_media(
    gcs: Option<&google_cloud_storage::client::Storage>,
    local_storage_path: Option<&PathBuf>,
    bucket_name: &str,
    storage_path: &str,
) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(local_path) = local_storage_path {
        let full_path = local_path.join(storage_path);
        Ok(tokio::fs::read(&full_path).await?)
    } else if let Some(gcs) = gcs {
        let bucket = format!("projects/_/buckets/{}", bucket_name);
        let mut resp = gcs.read_object(&bucket, storage_path).send().await?;
        let mut data = Vec::new();
        while let Some(chunk) = resp.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    } else {
        Err("No storage backend configured (set LOCAL_STORAGE_PATH or GOOGLE_APPLICATION_CREDENTIALS)".into())
    }
}

/// Upload media bytes to local storage or GCS.
pub async fn upload_data(
    gcs: Option<&google_cloud_storage::client::Storage>,
    local_storage_path: Option<&PathBuf>,
    bucket_name: &str,
    storage_path: &str,
    data: &[u8],
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(local_path) = local_storage_path {
        let full_path = local_path.join(storage_path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, data).await?;
    } else if let Some(gcs) = gcs {
        let bucket = format!("projects/_/buckets/{}", bucket_name);
        let bytes = Bytes::copy_from_slice(data);
        gcs.write_object(&bucket, storage_path, bytes)
            .send_buffered()
            .await?;
    } else {
        return Err("No storage backend configured".into());
    }
    Ok(())
}

/// Delete a media object (cleanup when a group is deleted before publishing)
pub async fn delete_data(
    gcs: Option<&google_cloud_storage::client::Storage>,
    local_storage_path: Option<&PathBuf>,
    bucket_name: &str,
    storage_path: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(local_path) = local_storage_path {
        let full_path = local_path.join(storage_path);
        tokio::fs::remove_file(&full_path).await?;
    } else if gcs.is_some() {
        let client = cloud_storage::Client::default();
        client.object().delete(bucket_name, storage_path).await?;
    }
    Ok(())
}

/// Storage path for a new media asset, namespaced by account and group.
/// File names are sanitized so client input cannot shape the path.
pub fn media_storage_path(
    account_id: i64,
    post_group_id: &str,
    media_id: &str,
    file_name: &str,
) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "media/account_{}/{}/{}_{}",
        account_id, post_group_id, media_id, sanitized
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_paths_are_namespaced_and_sanitized() {
        let path = media_storage_path(7, "pg_abc", "med_xyz", "holiday photo.png");
        assert_eq!(path, "media/account_7/pg_abc/med_xyz_holiday_photo.png");

        // Separators in client file names cannot introduce path segments.
        let path = media_storage_path(7, "pg_abc", "med_xyz", "../../etc/passwd");
        assert_eq!(path, "media/account_7/pg_abc/med_xyz_.._.._etc_passwd");
        assert_eq!(path.matches('/').count(), 3);
    }
}
