//! Per-platform publishing constraints.
//!
//! Character limits gate truncation inside each adapter; media limits gate
//! both the adapter at publish time and the upload broker at
//! upload-target-request time (via [`media_capacity`]).

use super::{MediaAttachment, PublishError};
use crate::domain::connections::Platform;

/// Hard limits a platform enforces on a single post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    pub max_chars: usize,
    pub max_images: i64,
    pub max_videos: i64,
}

pub const fn limits_for(platform: Platform) -> PlatformLimits {
    match platform {
        Platform::Twitter => PlatformLimits {
            max_chars: 280,
            max_images: 4,
            max_videos: 1,
        },
        Platform::Linkedin => PlatformLimits {
            max_chars: 3000,
            max_images: 9,
            max_videos: 1,
        },
        Platform::Instagram => PlatformLimits {
            max_chars: 2200,
            max_images: 10,
            max_videos: 1,
        },
        Platform::Threads => PlatformLimits {
            max_chars: 500,
            max_images: 10,
            max_videos: 1,
        },
        Platform::Tiktok => PlatformLimits {
            max_chars: 2200,
            max_images: 35,
            max_videos: 1,
        },
        Platform::Youtube => PlatformLimits {
            max_chars: 5000,
            max_images: 0,
            max_videos: 1,
        },
        Platform::Facebook => PlatformLimits {
            max_chars: 63206,
            max_images: 10,
            max_videos: 1,
        },
        Platform::Bluesky => PlatformLimits {
            max_chars: 300,
            max_images: 4,
            max_videos: 1,
        },
        Platform::Mastodon => PlatformLimits {
            max_chars: 500,
            max_images: 4,
            max_videos: 1,
        },
        Platform::Telegram => PlatformLimits {
            max_chars: 4096,
            max_images: 10,
            max_videos: 1,
        },
    }
}

impl PlatformLimits {
    /// Clamp content to the platform's character limit on a character
    /// boundary. Always returns a copy; the group's content is the source of
    /// truth and never changes.
    pub fn clamp_text(&self, content: &str) -> String {
        content.chars().take(self.max_chars).collect()
    }

    /// Reject attachment sets the platform cannot accept
    pub fn check_media(&self, media: &[MediaAttachment]) -> Result<(), PublishError> {
        let images = media.iter().filter(|m| m.is_image()).count() as i64;
        let videos = media.iter().filter(|m| m.is_video()).count() as i64;

        if images > self.max_images {
            return Err(PublishError::Rejected(format!(
                "too many images: {} (limit {})",
                images, self.max_images
            )));
        }
        if videos > self.max_videos {
            return Err(PublishError::Rejected(format!(
                "too many videos: {} (limit {})",
                videos, self.max_videos
            )));
        }
        Ok(())
    }
}

/// Most restrictive media capacity across a set of platforms. A group posting
/// to Twitter and Instagram together can only carry what both accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaCapacity {
    pub max_images: i64,
    pub max_videos: i64,
}

pub fn media_capacity(platforms: &[Platform]) -> MediaCapacity {
    platforms.iter().fold(
        MediaCapacity {
            max_images: i64::MAX,
            max_videos: i64::MAX,
        },
        |cap, p| {
            let limits = limits_for(*p);
            MediaCapacity {
                max_images: cap.max_images.min(limits.max_images),
                max_videos: cap.max_videos.min(limits.max_videos),
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> MediaAttachment {
        MediaAttachment {
            file_url: "https://media.example.com/a.png".to_string(),
            content_type: "image/png".to_string(),
        }
    }

    fn video() -> MediaAttachment {
        MediaAttachment {
            file_url: "https://media.example.com/a.mp4".to_string(),
            content_type: "video/mp4".to_string(),
        }
    }

    #[test]
    fn clamp_respects_char_boundaries() {
        let limits = limits_for(Platform::Twitter);
        let long = "é".repeat(300);
        let clamped = limits.clamp_text(&long);
        assert_eq!(clamped.chars().count(), 280);

        let short = "hello";
        assert_eq!(limits.clamp_text(short), "hello");
    }

    #[test]
    fn media_counts_are_enforced() {
        let limits = limits_for(Platform::Twitter);
        assert!(limits.check_media(&[image(), image(), image(), image()]).is_ok());
        assert!(
            limits
                .check_media(&[image(), image(), image(), image(), image()])
                .is_err()
        );
        assert!(limits.check_media(&[video(), video()]).is_err());
    }

    #[test]
    fn capacity_takes_the_most_restrictive_platform() {
        let cap = media_capacity(&[Platform::Instagram, Platform::Twitter]);
        assert_eq!(cap.max_images, 4);
        assert_eq!(cap.max_videos, 1);

        let cap = media_capacity(&[Platform::Youtube, Platform::Facebook]);
        assert_eq!(cap.max_images, 0);
    }
}
